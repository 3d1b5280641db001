use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Failed to prepare working directory {path}: {source}")]
    WorkingDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to reset {path} for a new run: {reason}")]
    WorkspaceReset { path: PathBuf, reason: String },

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("Extractor failed for {url}: {reason}")]
    ExtractorFailed { url: String, reason: String },

    #[error("Timed out after {waited_secs:.1}s waiting for {path} to be finalized")]
    FinalizeTimeout { path: PathBuf, waited_secs: f64 },

    #[error("Expected file {0} was not produced")]
    Missing(PathBuf),

    #[error("No captions available in {languages:?}")]
    NoCaptions { languages: Vec<String> },

    #[error("Failed to clean caption file {path}: {source}")]
    CaptionCleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Failed to load speech model from {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    Inference { audio_path: PathBuf, reason: String },

    #[error("Audio preparation failed for {audio_path}: {reason}")]
    AudioPreparation { audio_path: PathBuf, reason: String },

    #[error("Model download failed from {url}: {reason}")]
    ModelDownload { url: String, reason: String },

    #[error("Failed to write transcript to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Transcript not found: {0}")]
    TranscriptMissing(PathBuf),

    #[error("Transcript is empty")]
    EmptyTranscript,

    #[error("Invalid parameter {name}: {value} (expected {expected})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Source video not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to prepare clip directory {path}: {source}")]
    ClipDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Missing {which} timestamp")]
    MissingTimestamp { which: &'static str },

    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("End {end} is not after start {start}")]
    NonPositiveDuration { start: String, end: String },

    #[error("Segment ends at {end_secs:.3}s but the source is only {source_secs:.3}s long")]
    OutOfRange { end_secs: f64, source_secs: f64 },

    #[error("Segment overlaps {other}")]
    Overlap { other: String },

    #[error("Clip number {0} was already rendered in this batch")]
    DuplicateOrdinal(u32),

    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("Encoder failed for {output}: {stderr}")]
    Encoder { output: PathBuf, stderr: String },
}

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Directory {path} is not readable: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum UclipsError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UclipsError>;
