use std::{fmt, ops::RangeInclusive, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// One timed unit of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipStyle {
    #[default]
    Educational,
    Funny,
    Entertaining,
}

impl ClipStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStyle::Educational => "educational",
            ClipStyle::Funny => "funny",
            ClipStyle::Entertaining => "entertaining",
        }
    }
}

impl fmt::Display for ClipStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User parameters for one selection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest {
    pub count: u8,
    pub clip_length_secs: u32,
    pub style: ClipStyle,
}

impl SelectionRequest {
    pub const COUNT_RANGE: RangeInclusive<u8> = 1..=3;
    pub const LENGTH_RANGE: RangeInclusive<u32> = 10..=50;

    pub fn new(
        count: u8,
        clip_length_secs: u32,
        style: ClipStyle,
    ) -> Result<Self, SelectionError> {
        if !Self::COUNT_RANGE.contains(&count) {
            return Err(SelectionError::InvalidParameter {
                name: "count",
                value: count.to_string(),
                expected: "1..=3",
            });
        }
        if !Self::LENGTH_RANGE.contains(&clip_length_secs) {
            return Err(SelectionError::InvalidParameter {
                name: "clip_length_secs",
                value: clip_length_secs.to_string(),
                expected: "10..=50",
            });
        }
        Ok(Self {
            count,
            clip_length_secs,
            style,
        })
    }
}

impl Default for SelectionRequest {
    fn default() -> Self {
        Self {
            count: 3,
            clip_length_secs: 30,
            style: ClipStyle::Educational,
        }
    }
}

/// A time range picked by the language model.
///
/// Timestamps stay as the raw strings the model returned; they are only
/// parsed and checked when the segment is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub ordinal: u32,
    pub start: Option<String>,
    pub end: Option<String>,
    pub caption: String,
    pub hashtags: Vec<String>,
}

impl Segment {
    pub fn clip_file_name(&self) -> String {
        format!("clip_{}.mp4", self.ordinal)
    }

    pub fn hashtag_line(&self) -> String {
        self.hashtags.join(" ")
    }
}

/// Normalized result of segment selection, ordered by ordinal.
///
/// An empty selection is the uniform "nothing to clip" signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    segments: Vec<Segment>,
}

impl Selection {
    pub fn new(mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(|s| s.ordinal);
        Self { segments }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl IntoIterator for Selection {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

/// A rendered clip on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipFile {
    pub segment_name: String,
    pub ordinal: u32,
    pub path: PathBuf,
    pub caption: String,
    pub hashtags: Vec<String>,
}
