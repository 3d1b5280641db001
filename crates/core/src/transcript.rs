//! On-disk transcript convention shared by caption-derived and
//! speech-to-text transcripts:
//!
//! ```text
//! 00:00:01.000 --> 00:00:04.500
//! spoken text
//!
//! 00:00:04.500 --> 00:00:07.250
//! more text
//! ```

use crate::{
    timestamp::{format_timestamp, parse_timestamp},
    types::TranscriptLine,
};

/// Render transcript lines as `START --> END` blocks separated by blank lines.
pub fn render_transcript(lines: &[TranscriptLine]) -> String {
    let mut output = String::new();
    for line in lines {
        output.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(line.start),
            format_timestamp(line.end),
            line.text.trim()
        ));
    }
    output
}

/// Parse `START --> END` blocks back into lines.
///
/// Blocks without a readable cue line are skipped, so caption remainders
/// with cue identifiers or settings after the end time still parse.
pub fn parse_transcript(content: &str) -> Vec<TranscriptLine> {
    let mut lines = Vec::new();
    let normalized = content.replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let mut rows = block.lines().skip_while(|row| !row.contains("-->"));
        let Some(cue) = rows.next() else {
            continue;
        };
        let Some((start, rest)) = cue.split_once("-->") else {
            continue;
        };
        let end = rest.split_whitespace().next().unwrap_or_default();
        let (Ok(start), Ok(end)) = (parse_timestamp(start), parse_timestamp(end)) else {
            continue;
        };

        let text = rows
            .map(str::trim)
            .filter(|row| !row.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        lines.push(TranscriptLine { start, end, text });
    }

    lines
}

/// Drop the first `header_lines` lines of a raw caption file, keeping the
/// remainder (including its line endings) untouched.
pub fn strip_caption_header(raw: &str, header_lines: usize) -> String {
    raw.split_inclusive('\n').skip(header_lines).collect()
}
