use std::{
    collections::HashSet,
    ffi::OsString,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::{debug, info, warn};

use crate::{
    error::RenderError,
    timestamp::{format_timestamp, parse_timestamp},
    types::{ClipFile, Segment, Selection},
    workspace::Workspace,
};

/// Vertical output geometry and look.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipLook {
    pub width: u32,
    pub height: u32,
    pub contrast: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub fps: u32,
    pub pixel_format: &'static str,
}

impl Default for ClipLook {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            contrast: 1.1,
            brightness: 0.03,
            saturation: 1.15,
            fps: 30,
            pixel_format: "yuv420p",
        }
    }
}

impl ClipLook {
    /// Scale to output height, center-crop, color-correct, normalize rate
    /// and pixel format, in that order.
    pub fn filter_chain(&self) -> String {
        format!(
            "scale=-1:{h},crop={w}:{h},eq=contrast={c}:brightness={b}:saturation={s},fps={fps},format={pix}",
            h = self.height,
            w = self.width,
            c = self.contrast,
            b = self.brightness,
            s = self.saturation,
            fps = self.fps,
            pix = self.pixel_format,
        )
    }
}

/// Codec parameters handed to the encoder unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecSettings {
    pub audio_codec: &'static str,
    pub video_codec: &'static str,
    pub crf: u8,
    pub preset: &'static str,
    pub movflags: &'static str,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            audio_codec: "aac",
            video_codec: "libx264",
            crf: 23,
            preset: "slow",
            movflags: "+faststart",
        }
    }
}

/// One trim-and-style request for the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub output: PathBuf,
    pub filter: String,
    pub codec: CodecSettings,
}

impl EncodeJob {
    pub fn new(input: &Path, start_secs: f64, duration_secs: f64, output: PathBuf) -> Self {
        Self {
            input: input.to_path_buf(),
            start_secs,
            duration_secs,
            output,
            filter: ClipLook::default().filter_chain(),
            codec: CodecSettings::default(),
        }
    }

    /// ffmpeg argument list for this job. The first video and first audio
    /// stream are mapped explicitly because sources may carry several.
    pub fn ffmpeg_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |a: &str| args.push(a.into());

        push("-y");
        push("-ss");
        push(&format_timestamp(self.start_secs));
        push("-t");
        push(&format!("{:.3}", self.duration_secs));
        push("-i");
        args.push(self.input.clone().into());

        let crf = self.codec.crf.to_string();
        for a in [
            "-map",
            "0:v:0",
            "-map",
            "0:a:0",
            "-vf",
            self.filter.as_str(),
            "-acodec",
            self.codec.audio_codec,
            "-vcodec",
            self.codec.video_codec,
            "-crf",
            crf.as_str(),
            "-preset",
            self.codec.preset,
            "-movflags",
            self.codec.movflags,
        ] {
            args.push(a.into());
        }

        args.push(self.output.clone().into());
        args
    }
}

/// Black-box video encoder.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    async fn encode(&self, job: &EncodeJob) -> Result<(), RenderError>;

    /// Source duration in seconds, when it can be determined.
    async fn probe_duration(&self, _input: &Path) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), RenderError> {
        let output = Command::new(&self.ffmpeg)
            .args(job.ffmpeg_args())
            .output()
            .await
            .map_err(|source| RenderError::Launch {
                program: self.ffmpeg.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RenderError::Encoder {
                output: job.output.clone(),
                stderr: if stderr.is_empty() {
                    "No stderr captured.".to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(())
    }

    async fn probe_duration(&self, input: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(input)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }
}

#[derive(Debug)]
pub struct SkippedSegment {
    pub segment_name: String,
    pub ordinal: u32,
    pub reason: RenderError,
}

/// Per-segment outcome of a rendering batch.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub rendered: Vec<ClipFile>,
    pub skipped: Vec<SkippedSegment>,
}

struct Accepted {
    start: f64,
    end: f64,
    name: String,
}

fn validate(
    segment: &Segment,
    source_secs: Option<f64>,
    accepted: &[Accepted],
    rendered_ordinals: &HashSet<u32>,
) -> Result<(f64, f64), RenderError> {
    let start_raw = segment
        .start
        .as_deref()
        .ok_or(RenderError::MissingTimestamp { which: "start" })?;
    let end_raw = segment
        .end
        .as_deref()
        .ok_or(RenderError::MissingTimestamp { which: "end" })?;

    let start = parse_timestamp(start_raw)?;
    let end = parse_timestamp(end_raw)?;

    if end <= start {
        return Err(RenderError::NonPositiveDuration {
            start: start_raw.to_string(),
            end: end_raw.to_string(),
        });
    }

    if let Some(source_secs) = source_secs {
        if end > source_secs {
            return Err(RenderError::OutOfRange {
                end_secs: end,
                source_secs,
            });
        }
    }

    if rendered_ordinals.contains(&segment.ordinal) {
        return Err(RenderError::DuplicateOrdinal(segment.ordinal));
    }

    if let Some(other) = accepted.iter().find(|a| start < a.end && a.start < end) {
        return Err(RenderError::Overlap {
            other: other.name.clone(),
        });
    }

    Ok((start, end))
}

/// Render one clip per valid segment into `clips_dir`.
///
/// Invalid segments and encoder failures are recorded in the report and do
/// not stop the batch. Only a missing source or an unusable clip directory
/// fails the whole call.
pub async fn render_clips(
    selection: &Selection,
    source: &Path,
    clips_dir: &Path,
    encoder: &dyn VideoEncoder,
) -> Result<RenderReport, RenderError> {
    if !fs::try_exists(source).await.unwrap_or(false) {
        return Err(RenderError::SourceMissing(source.to_path_buf()));
    }

    fs::create_dir_all(clips_dir)
        .await
        .map_err(|source| RenderError::ClipDir {
            path: clips_dir.to_path_buf(),
            source,
        })?;

    let source_secs = encoder.probe_duration(source).await;
    match source_secs {
        Some(secs) => debug!("source duration {:.3}s", secs),
        None => warn!(
            "could not determine duration of {}, skipping range checks",
            source.display()
        ),
    }

    let mut report = RenderReport::default();
    let mut accepted: Vec<Accepted> = Vec::new();
    let mut rendered_ordinals: HashSet<u32> = HashSet::new();

    for segment in selection.segments() {
        let skip = |reason: RenderError| {
            warn!("skipping {}: {}", segment.name, reason);
            SkippedSegment {
                segment_name: segment.name.clone(),
                ordinal: segment.ordinal,
                reason,
            }
        };

        let (start, end) = match validate(segment, source_secs, &accepted, &rendered_ordinals) {
            Ok(range) => range,
            Err(reason) => {
                report.skipped.push(skip(reason));
                continue;
            }
        };

        let output = clips_dir.join(segment.clip_file_name());
        let job = EncodeJob::new(source, start, end - start, output.clone());

        match encoder.encode(&job).await {
            Ok(()) => {
                info!(
                    "rendered {} ({} → {}) to {}",
                    segment.name,
                    format_timestamp(start),
                    format_timestamp(end),
                    output.display()
                );
                accepted.push(Accepted {
                    start,
                    end,
                    name: segment.name.clone(),
                });
                rendered_ordinals.insert(segment.ordinal);
                report.rendered.push(ClipFile {
                    segment_name: segment.name.clone(),
                    ordinal: segment.ordinal,
                    path: output,
                    caption: segment.caption.clone(),
                    hashtags: segment.hashtags.clone(),
                });
            }
            Err(reason) => report.skipped.push(skip(reason)),
        }
    }

    Ok(report)
}

/// Render from the workspace's source video into its clip directory.
pub async fn render_workspace(
    selection: &Selection,
    workspace: &Workspace,
    encoder: &dyn VideoEncoder,
) -> Result<RenderReport, RenderError> {
    render_clips(
        selection,
        &workspace.video_path(),
        workspace.clips_dir(),
        encoder,
    )
    .await
}
