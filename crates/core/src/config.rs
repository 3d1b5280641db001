use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    selection::{Endpoint, ResponseShape},
    workspace::{get_model_dir, get_root_cache_dir},
};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding `downloads/` and `clips/`
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_yt_dlp")]
    pub yt_dlp: String,
    #[serde(default = "default_subtitle_languages")]
    pub subtitle_languages: Vec<String>,
    /// How long to wait for the merged video to show up after the extractor returns
    #[serde(default = "default_finalize_timeout")]
    pub finalize_timeout_secs: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Lines of timed-text header dropped from caption files
    #[serde(default = "default_caption_header_lines")]
    pub caption_header_lines: usize,
    /// MP3 quality passed to the extractor (kbps)
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
}

impl AcquisitionConfig {
    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.finalize_timeout_secs.max(0.0))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            yt_dlp: default_yt_dlp(),
            subtitle_languages: default_subtitle_languages(),
            finalize_timeout_secs: default_finalize_timeout(),
            poll_interval_ms: default_poll_interval(),
            caption_header_lines: default_caption_header_lines(),
            audio_quality: default_audio_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model: tiny, base, small, medium, large-v3
    #[serde(default = "default_model")]
    pub model: String,
    pub models_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub use_gpu: bool,
}

impl TranscriptionConfig {
    pub fn models_dir(&self) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| get_model_dir(&get_root_cache_dir()))
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            models_dir: None,
            use_gpu: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_selection_timeout")]
    pub timeout_secs: u64,
    /// Tried in order until one yields a parsable answer
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,
    /// Environment variable holding a bearer token, if the service needs one
    pub api_key_env: Option<String>,
}

impl SelectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_selection_timeout(),
            endpoints: default_endpoints(),
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_yt_dlp() -> String {
    "yt-dlp".to_string()
}

fn default_subtitle_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_finalize_timeout() -> f64 {
    80.0
}

fn default_poll_interval() -> u64 {
    500
}

fn default_caption_header_lines() -> usize {
    3
}

fn default_audio_quality() -> String {
    "192".to_string()
}

fn default_model() -> String {
    "tiny".to_string()
}

fn default_true() -> bool {
    true
}

fn default_selection_timeout() -> u64 {
    60
}

fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint {
            url: "https://text.pollinations.ai".to_string(),
            shape: ResponseShape::Direct,
        },
        Endpoint {
            url: "https://text.pollinations.ai/openai".to_string(),
            shape: ResponseShape::ChatCompletion,
        },
    ]
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

/// `<config dir>/uclips/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("uclips").join("config.toml"))
}

impl Settings {
    /// Load settings from an explicit file, or from the default location if
    /// it exists, or fall back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.selection.endpoints.is_empty() {
            return Err(ConfigError::Invalid(
                "selection.endpoints must list at least one endpoint".to_string(),
            ));
        }
        if self.acquisition.subtitle_languages.is_empty() {
            return Err(ConfigError::Invalid(
                "acquisition.subtitle_languages must not be empty".to_string(),
            ));
        }
        if !self.acquisition.finalize_timeout_secs.is_finite()
            || self.acquisition.finalize_timeout_secs < 0.0
        {
            return Err(ConfigError::Invalid(
                "acquisition.finalize_timeout_secs must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}
