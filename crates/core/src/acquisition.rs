use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{
    fs,
    process::Command,
    time::{Instant, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    config::AcquisitionConfig,
    error::AcquisitionError,
    transcript::strip_caption_header,
    workspace::Workspace,
};

/// What to pull from a media URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Best audio, transcoded to MP3.
    Audio,
    /// Best video and audio merged into MP4.
    Video,
    /// Creator-provided captions only, no media download.
    Subtitles { languages: Vec<String> },
}

/// Black-box "download by URL" capability. Files land in `dir`.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str, mode: &FetchMode, dir: &Path) -> Result<(), AcquisitionError>;
}

/// `MediaFetcher` backed by the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: String,
    audio_quality: String,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<String>, audio_quality: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            audio_quality: audio_quality.into(),
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(&config.yt_dlp, &config.audio_quality)
    }

    pub fn build_args(&self, url: &str, mode: &FetchMode, dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--no-playlist".into(), "--windows-filenames".into()];

        match mode {
            FetchMode::Audio => {
                args.extend(
                    ["-f", "bestaudio/best", "-x", "--audio-format", "mp3"].map(OsString::from),
                );
                args.push("--audio-quality".into());
                args.push(format!("{}K", self.audio_quality).into());
                args.push("-o".into());
                args.push(dir.join("audio.%(ext)s").into());
            }
            FetchMode::Video => {
                args.extend(
                    ["-f", "bestvideo+bestaudio/best", "--merge-output-format", "mp4"]
                        .map(OsString::from),
                );
                args.push("-o".into());
                args.push(dir.join("video.%(ext)s").into());
            }
            FetchMode::Subtitles { languages } => {
                args.extend(
                    ["--skip-download", "--write-subs", "--sub-format", "vtt", "--quiet"]
                        .map(OsString::from),
                );
                args.push("--sub-langs".into());
                args.push(languages.join(",").into());
                args.push("-o".into());
                args.push(dir.join("sub.%(ext)s").into());
            }
        }

        args.push(url.into());
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        mode: &FetchMode,
        dir: &Path,
    ) -> Result<(), AcquisitionError> {
        debug!(?mode, url, "running {}", self.program);
        let output = Command::new(&self.program)
            .args(self.build_args(url, mode, dir))
            .output()
            .await
            .map_err(|source| AcquisitionError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AcquisitionError::ExtractorFailed {
                url: url.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Per-artifact results of one acquisition run. Partial success is normal.
#[derive(Debug)]
pub struct AcquisitionOutcome {
    pub audio: Result<PathBuf, AcquisitionError>,
    pub video: Result<PathBuf, AcquisitionError>,
    pub transcript: Result<PathBuf, AcquisitionError>,
}

impl AcquisitionOutcome {
    pub fn audio_ok(&self) -> bool {
        self.audio.is_ok()
    }

    pub fn video_ok(&self) -> bool {
        self.video.is_ok()
    }

    pub fn subtitles_ok(&self) -> bool {
        self.transcript.is_ok()
    }

    /// Media is usable for clipping and, if needed, transcription.
    pub fn downloads_ready(&self) -> bool {
        self.audio_ok() && self.video_ok()
    }
}

/// Download audio, video and captions for `url` into the workspace.
///
/// Both workspace directories are emptied first so nothing from an earlier
/// run can stand in for a failed download. Never fails as a whole; each
/// artifact carries its own outcome.
pub async fn acquire(
    fetcher: &dyn MediaFetcher,
    url: &str,
    workspace: &Workspace,
    config: &AcquisitionConfig,
) -> AcquisitionOutcome {
    if let Err(e) = reset_workspace(workspace, &[]).await {
        warn!("workspace reset failed: {}", e);
        let (path, reason) = match e {
            AcquisitionError::WorkspaceReset { path, reason } => (path, reason),
            other => (workspace.downloads_dir().to_path_buf(), other.to_string()),
        };
        let failed = || {
            Err(AcquisitionError::WorkspaceReset {
                path: path.clone(),
                reason: reason.clone(),
            })
        };
        return AcquisitionOutcome {
            audio: failed(),
            video: failed(),
            transcript: failed(),
        };
    }

    let audio = download_audio(fetcher, url, workspace).await;
    log_outcome("audio", &audio);
    let video = download_video(fetcher, url, workspace, config).await;
    log_outcome("video", &video);
    let transcript = download_subtitles(fetcher, url, workspace, config).await;
    log_outcome("subtitles", &transcript);

    AcquisitionOutcome {
        audio,
        video,
        transcript,
    }
}

fn log_outcome(what: &str, outcome: &Result<PathBuf, AcquisitionError>) {
    match outcome {
        Ok(path) => info!("{} ready at {}", what, path.display()),
        Err(e) => warn!("{} acquisition failed: {}", what, e),
    }
}

/// Empty the download and clip directories, creating them if needed.
///
/// Entries that are, or contain, one of the canonical paths in `keep` are
/// left in place.
pub async fn reset_workspace(
    workspace: &Workspace,
    keep: &[PathBuf],
) -> Result<(), AcquisitionError> {
    for dir in [workspace.downloads_dir(), workspace.clips_dir()] {
        reset_dir(dir, keep).await?;
    }
    debug!(
        "reset {} and {}",
        workspace.downloads_dir().display(),
        workspace.clips_dir().display()
    );
    Ok(())
}

async fn reset_dir(dir: &Path, keep: &[PathBuf]) -> Result<(), AcquisitionError> {
    ensure_dir(dir).await?;

    let reset_err = |path: &Path, e: std::io::Error| AcquisitionError::WorkspaceReset {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut entries = fs::read_dir(dir).await.map_err(|e| reset_err(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| reset_err(dir, e))? {
        let path = entry.path();
        let kept = match fs::canonicalize(&path).await {
            Ok(canonical) => keep.iter().any(|k| k.starts_with(&canonical)),
            Err(_) => false,
        };
        if kept {
            debug!("keeping {} during reset", path.display());
            continue;
        }

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| reset_err(path.as_path(), e))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        removed.map_err(|e| reset_err(path.as_path(), e))?;
    }

    Ok(())
}

async fn ensure_dir(dir: &Path) -> Result<(), AcquisitionError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|source| AcquisitionError::WorkingDir {
            path: dir.to_path_buf(),
            source,
        })
}

pub async fn download_audio(
    fetcher: &dyn MediaFetcher,
    url: &str,
    workspace: &Workspace,
) -> Result<PathBuf, AcquisitionError> {
    let dir = workspace.downloads_dir();
    ensure_dir(dir).await?;

    fetcher.fetch(url, &FetchMode::Audio, dir).await?;

    let audio = workspace.audio_path();
    if file_ready(&audio).await {
        Ok(audio)
    } else {
        Err(AcquisitionError::Missing(audio))
    }
}

/// Download the merged MP4, then poll until the final file can be opened.
pub async fn download_video(
    fetcher: &dyn MediaFetcher,
    url: &str,
    workspace: &Workspace,
    config: &AcquisitionConfig,
) -> Result<PathBuf, AcquisitionError> {
    let dir = workspace.downloads_dir();
    ensure_dir(dir).await?;

    fetcher.fetch(url, &FetchMode::Video, dir).await?;

    let video = workspace.video_path();
    let timeout = config.finalize_timeout();
    if wait_for_file(&video, timeout, config.poll_interval()).await {
        Ok(video)
    } else {
        Err(AcquisitionError::FinalizeTimeout {
            path: video,
            waited_secs: timeout.as_secs_f64(),
        })
    }
}

/// Fetch creator captions and persist them, minus the timed-text header, as
/// the workspace transcript.
///
/// The caption file for the earliest listed language wins. Every caption
/// file in the directory is removed before fetching and after conversion.
pub async fn download_subtitles(
    fetcher: &dyn MediaFetcher,
    url: &str,
    workspace: &Workspace,
    config: &AcquisitionConfig,
) -> Result<PathBuf, AcquisitionError> {
    let dir = workspace.downloads_dir();
    ensure_dir(dir).await?;
    remove_caption_files(dir).await?;

    let languages = config.subtitle_languages.clone();
    fetcher
        .fetch(
            url,
            &FetchMode::Subtitles {
                languages: languages.clone(),
            },
            dir,
        )
        .await?;

    let found = caption_files(dir).await.map_err(|source| AcquisitionError::CaptionCleanup {
        path: dir.to_path_buf(),
        source,
    })?;
    let Some(caption_file) = pick_caption_file(&found, &languages) else {
        return Err(AcquisitionError::NoCaptions { languages });
    };
    debug!("using captions from {}", caption_file.display());

    let raw = fs::read(&caption_file)
        .await
        .map_err(|source| AcquisitionError::CaptionCleanup {
            path: caption_file.clone(),
            source,
        })?;
    let cleaned = strip_caption_header(
        &String::from_utf8_lossy(&raw),
        config.caption_header_lines,
    );

    let transcript = workspace.transcript_path();
    fs::write(&transcript, cleaned)
        .await
        .map_err(|source| AcquisitionError::CaptionCleanup {
            path: transcript.clone(),
            source,
        })?;
    remove_caption_files(dir).await?;

    Ok(transcript)
}

/// `.vtt` files directly inside `dir`, sorted by name.
async fn caption_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_vtt = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("vtt"));
        if is_vtt {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

async fn remove_caption_files(dir: &Path) -> Result<(), AcquisitionError> {
    let found = caption_files(dir)
        .await
        .map_err(|source| AcquisitionError::CaptionCleanup {
            path: dir.to_path_buf(),
            source,
        })?;
    for path in found {
        fs::remove_file(&path)
            .await
            .map_err(|source| AcquisitionError::CaptionCleanup {
                path: path.clone(),
                source,
            })?;
    }
    Ok(())
}

/// `sub.<lang>.vtt` for the first language that has one, else the first
/// caption file by name (regional variants such as `sub.en-US.vtt`).
pub fn pick_caption_file(files: &[PathBuf], languages: &[String]) -> Option<PathBuf> {
    languages
        .iter()
        .find_map(|lang| {
            let wanted = format!("sub.{}.vtt", lang);
            files
                .iter()
                .find(|f| f.file_name().is_some_and(|name| name == wanted.as_str()))
        })
        .or_else(|| files.first())
        .cloned()
}

/// The file exists and can be opened for reading.
pub async fn file_ready(path: &Path) -> bool {
    match fs::File::open(path).await {
        Ok(file) => file.metadata().await.is_ok_and(|m| m.is_file()),
        Err(_) => false,
    }
}

/// Poll for `path` every `interval` until it is ready or `timeout` elapses.
pub async fn wait_for_file(
    path: &Path,
    timeout: std::time::Duration,
    interval: std::time::Duration,
) -> bool {
    let started = Instant::now();
    loop {
        if file_ready(path).await {
            return true;
        }
        if started.elapsed() >= timeout {
            return false;
        }
        sleep(interval).await;
    }
}

/// Copy a user-supplied video and transcript into a freshly reset workspace
/// under the well-known names. A source that already is the destination is
/// left as is.
pub async fn import_local(
    workspace: &Workspace,
    video: &Path,
    transcript: &Path,
) -> Result<(PathBuf, PathBuf), AcquisitionError> {
    let mut sources = Vec::with_capacity(2);
    for src in [video, transcript] {
        if !file_ready(src).await {
            return Err(AcquisitionError::Missing(src.to_path_buf()));
        }
        let canonical = fs::canonicalize(src)
            .await
            .map_err(|_| AcquisitionError::Missing(src.to_path_buf()))?;
        sources.push(canonical);
    }

    reset_workspace(workspace, &sources).await?;

    let video_dest = workspace.video_path();
    let transcript_dest = workspace.transcript_path();

    for (src, dest) in sources.iter().zip([&video_dest, &transcript_dest]) {
        let in_place = fs::canonicalize(dest)
            .await
            .is_ok_and(|canonical| canonical == *src);
        if in_place {
            debug!("{} is already in place", dest.display());
            continue;
        }
        fs::copy(src, dest)
            .await
            .map_err(|source| AcquisitionError::WorkingDir {
                path: dest.clone(),
                source,
            })?;
    }

    Ok((video_dest, transcript_dest))
}
