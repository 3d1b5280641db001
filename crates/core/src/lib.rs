//! Turn a long video into short vertical clips: acquire media and a
//! transcript, ask a language model for the most engaging segments, then
//! cut and restyle each one with ffmpeg.

pub mod acquisition;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod render;
pub mod selection;
pub mod timestamp;
pub mod transcript;
pub mod transcription;
pub mod types;
pub mod workspace;

pub use acquisition::{AcquisitionOutcome, FetchMode, MediaFetcher, YtDlpFetcher, acquire};
pub use cleanup::{CleanupSummary, clear_files};
pub use config::Settings;
pub use error::{Result, UclipsError};
pub use render::{FfmpegEncoder, RenderReport, VideoEncoder, render_clips, render_workspace};
pub use selection::{Endpoint, ResponseShape, SegmentSelector, SelectionReport};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use transcription::SpeechToText;
pub use types::{ClipFile, ClipStyle, Segment, Selection, SelectionRequest, TranscriptLine};
pub use workspace::Workspace;
