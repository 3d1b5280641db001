use crate::error::RenderError;

/// Format seconds as an `HH:MM:SS.mmm` timestamp.
///
/// The value is rounded to whole milliseconds first so that hours, minutes
/// and seconds come out of integer division and can never read `60.000`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let rem_ms = total_ms % 60_000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        hours,
        minutes,
        rem_ms / 1000,
        rem_ms % 1000
    )
}

/// Parse an `H:M:S[.mmm]` timestamp into seconds (`h*3600 + m*60 + s`).
pub fn parse_timestamp(value: &str) -> Result<f64, RenderError> {
    let invalid = |reason: &str| RenderError::InvalidTimestamp {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = value.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(invalid("expected three ':'-separated fields"));
    };

    let hours: u64 = h.trim().parse().map_err(|_| invalid("hours are not a number"))?;
    let minutes: u64 = m
        .trim()
        .parse()
        .map_err(|_| invalid("minutes are not a number"))?;
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| invalid("seconds are not a number"))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid("seconds must be a non-negative number"));
    }

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_canonical_shape(s: &str) -> bool {
        let b = s.as_bytes();
        b.len() == 12
            && b.iter().enumerate().all(|(i, c)| match i {
                2 | 5 => *c == b':',
                8 => *c == b'.',
                _ => c.is_ascii_digit(),
            })
    }

    #[test]
    fn formats_fractional_seconds() {
        assert_eq!(format_timestamp(125.4), "00:02:05.400");
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(3661.007), "01:01:01.007");
    }

    #[test]
    fn never_prints_sixty_seconds() {
        assert_eq!(format_timestamp(59.9996), "00:01:00.000");
    }

    #[test]
    fn formatted_values_have_canonical_shape_and_round_trip() {
        for s in [0.0, 0.001, 1.5, 59.999, 61.25, 125.4, 3599.5, 3600.0, 86399.999] {
            let formatted = format_timestamp(s);
            assert!(has_canonical_shape(&formatted), "{formatted}");
            let parsed = parse_timestamp(&formatted).unwrap();
            assert!((parsed - s).abs() < 0.0005, "{s} -> {formatted} -> {parsed}");
        }
    }

    #[test]
    fn parses_to_seconds() {
        assert_eq!(parse_timestamp("00:01:30.000").unwrap(), 90.0);
        assert_eq!(
            parse_timestamp("01:00:00.000").unwrap() - parse_timestamp("00:59:00.000").unwrap(),
            60.0
        );
        assert_eq!(parse_timestamp("0:0:5").unwrap(), 5.0);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        for bad in ["", "01:30", "aa:00:00", "00:00:-1", "00:00:NaN", "1:2:3:4"] {
            assert!(
                matches!(
                    parse_timestamp(bad),
                    Err(RenderError::InvalidTimestamp { .. })
                ),
                "{bad:?}"
            );
        }
    }
}
