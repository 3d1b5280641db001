use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use uclips_core::{
    AcquisitionOutcome, ClipStyle, FfmpegEncoder, SegmentSelector, SelectionRequest, Settings,
    Workspace, YtDlpFetcher, acquire,
    acquisition::import_local,
    clear_files, render_workspace,
    timestamp::format_timestamp,
    transcript::parse_transcript,
};
use uuid::Uuid;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for ClipStyle (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliStyle {
    #[default]
    Educational,
    Funny,
    Entertaining,
}

impl From<CliStyle> for ClipStyle {
    fn from(cli: CliStyle) -> Self {
        match cli {
            CliStyle::Educational => ClipStyle::Educational,
            CliStyle::Funny => ClipStyle::Funny,
            CliStyle::Entertaining => ClipStyle::Entertaining,
        }
    }
}

#[derive(Parser)]
#[command(name = "uclips", version)]
#[command(about = "Cut long videos into short vertical clips picked by a language model")]
struct Cli {
    /// Config file (defaults to <config dir>/uclips/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a video by URL and cut clips from it
    Run {
        /// Video URL
        url: String,

        #[command(flatten)]
        clips: ClipArgs,

        /// Stop after downloading when no captions exist instead of transcribing
        #[arg(long)]
        no_transcribe: bool,
    },
    /// Cut clips from a local video and transcript
    Upload {
        #[arg(long)]
        video: PathBuf,

        #[arg(long)]
        transcript: PathBuf,

        #[command(flatten)]
        clips: ClipArgs,
    },
    /// Transcribe downloads/audio.mp3 into downloads/transcript.txt
    Transcribe,
    /// Remove all files from the download and clip directories
    Clear,
}

#[derive(Args)]
struct ClipArgs {
    /// Number of clips (1-3)
    #[arg(short = 'n', long, default_value_t = 3)]
    count: u8,

    /// Target clip length in seconds (10-50)
    #[arg(short, long, default_value_t = 30)]
    length: u32,

    /// Kind of moments to look for
    #[arg(short, long, value_enum, default_value = "educational")]
    style: CliStyle,

    /// Work in a fresh jobs/<id> directory instead of the shared one
    #[arg(long)]
    isolated: bool,
}

impl ClipArgs {
    fn request(&self) -> Result<SelectionRequest> {
        Ok(SelectionRequest::new(
            self.count,
            self.length,
            self.style.into(),
        )?)
    }

    fn workspace(&self, root: &Path) -> Workspace {
        if self.isolated {
            Workspace::for_job(root, Uuid::new_v4())
        } else {
            Workspace::new(root)
        }
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn ok_mark() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}

fn fail_mark() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}

fn elapsed(start: Instant) -> console::StyledObject<String> {
    style(format!("[{}]", format_duration(start.elapsed()))).dim()
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    let root = settings.workspace.root.clone();
    debug!(root = %root.display(), "settings loaded");

    println!(
        "\n{}  {}\n",
        style("uclips").cyan().bold(),
        style("Short Clip Maker").dim()
    );

    match cli.command {
        Command::Run {
            url,
            clips,
            no_transcribe,
        } => {
            let request = clips.request()?;
            let workspace = clips.workspace(&root);
            announce_job(&workspace);
            run_url(&settings, &workspace, &url, &request, no_transcribe).await
        }
        Command::Upload {
            video,
            transcript,
            clips,
        } => {
            let request = clips.request()?;
            let workspace = clips.workspace(&root);
            announce_job(&workspace);
            import_local(&workspace, &video, &transcript)
                .await
                .context("failed to import local files")?;
            println!(
                "{} Imported {} and {}",
                ok_mark(),
                style(video.display()).dim(),
                style(transcript.display()).dim()
            );
            select_and_render(&settings, &workspace, &request).await
        }
        Command::Transcribe => {
            let workspace = Workspace::new(&root);
            transcribe(&settings, &workspace).await
        }
        Command::Clear => {
            let workspace = Workspace::new(&root);
            let summary = clear_files(&workspace).await?;
            println!(
                "{} Removed {} files",
                ok_mark(),
                style(summary.removed.len()).cyan()
            );
            for dir in &summary.kept_dirs {
                println!("  {} {}", style("kept").dim(), dir.display());
            }
            Ok(())
        }
    }
}

fn announce_job(workspace: &Workspace) {
    if let Some(id) = workspace.job_id() {
        println!("{} {}", style("Job:").dim(), style(id).yellow());
    }
}

async fn run_url(
    settings: &Settings,
    workspace: &Workspace,
    url: &str,
    request: &SelectionRequest,
    no_transcribe: bool,
) -> Result<()> {
    let total_start = Instant::now();

    let step_start = Instant::now();
    let spinner = create_spinner("Downloading audio, video and captions...");
    let fetcher = YtDlpFetcher::from_config(&settings.acquisition);
    let outcome = acquire(&fetcher, url, workspace, &settings.acquisition).await;
    spinner.finish_with_message(format!("{} Acquisition done {}", ok_mark(), elapsed(step_start)));
    print_outcome(&outcome);

    if !outcome.downloads_ready() {
        error!(url, "audio or video download failed");
        bail!("download failed, nothing to clip");
    }

    if !outcome.subtitles_ok() {
        warn!(url, "no usable captions");
        if no_transcribe {
            println!(
                "\n{} No captions; files are ready for manual use:",
                style("!").yellow().bold()
            );
            println!("  {}", workspace.audio_path().display());
            println!("  {}", workspace.video_path().display());
            return Ok(());
        }
        transcribe(settings, workspace).await?;
    }

    select_and_render(settings, workspace, request).await?;

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    Ok(())
}

fn print_outcome(outcome: &AcquisitionOutcome) {
    for (what, result) in [
        ("Audio", &outcome.audio),
        ("Video", &outcome.video),
        ("Captions", &outcome.transcript),
    ] {
        match result {
            Ok(path) => println!("  {} {}: {}", ok_mark(), what, style(path.display()).dim()),
            Err(e) => println!("  {} {}: {}", fail_mark(), what, e),
        }
    }
}

#[cfg(feature = "whisper")]
async fn transcribe(settings: &Settings, workspace: &Workspace) -> Result<()> {
    use uclips_core::transcription::{ensure_model, transcribe_to_file, whisper};

    whisper::silence_native_logs();

    let config = &settings.transcription;
    let spinner = create_spinner(&format!("Checking {} model...", config.model));
    let model_path = ensure_model(&config.models_dir(), &config.model).await?;
    spinner.finish_with_message(format!("{} Model ready", ok_mark()));

    let step_start = Instant::now();
    let spinner = create_spinner("Transcribing with Whisper...");
    let stt = whisper::WhisperTranscriber::new(model_path, config.use_gpu, &settings.render.ffmpeg);
    let lines =
        transcribe_to_file(&stt, &workspace.audio_path(), &workspace.transcript_path()).await?;
    let duration_mins = lines.last().map(|l| l.end / 60.0).unwrap_or(0.0);
    spinner.finish_with_message(format!(
        "{} Transcribed: {:.1} min, {} lines {}",
        ok_mark(),
        duration_mins,
        lines.len(),
        elapsed(step_start)
    ));
    Ok(())
}

#[cfg(not(feature = "whisper"))]
async fn transcribe(_settings: &Settings, _workspace: &Workspace) -> Result<()> {
    bail!("built without the `whisper` feature; rebuild with it or pass --no-transcribe")
}

async fn select_and_render(
    settings: &Settings,
    workspace: &Workspace,
    request: &SelectionRequest,
) -> Result<()> {
    let transcript_path = workspace.transcript_path();
    let transcript = tokio::fs::read_to_string(&transcript_path)
        .await
        .with_context(|| format!("failed to read {}", transcript_path.display()))?;
    let lines = parse_transcript(&transcript);
    println!(
        "{} Transcript: {} lines, up to {}",
        ok_mark(),
        lines.len(),
        style(format_timestamp(lines.last().map(|l| l.end).unwrap_or(0.0))).yellow()
    );

    let step_start = Instant::now();
    let spinner = create_spinner(&format!(
        "Picking {} {} segments of ~{}s...",
        request.count, request.style, request.clip_length_secs
    ));
    let selector = SegmentSelector::from_config(&settings.selection)?;
    let report = selector.select_with_diagnostics(&transcript, request).await;

    if report.selection.is_empty() {
        warn!(
            failures = report.failures.len(),
            "segment selection returned nothing"
        );
        spinner.finish_with_message(format!("{} No segments selected", fail_mark()));
        for failure in &report.failures {
            let source = failure.endpoint.as_deref().unwrap_or("input");
            println!("  {} {}: {}", style("-").dim(), source, failure.error);
        }
        return Ok(());
    }
    spinner.finish_with_message(format!(
        "{} Selected {} segments {}",
        ok_mark(),
        report.selection.len(),
        elapsed(step_start)
    ));

    let step_start = Instant::now();
    let spinner = create_spinner("Rendering clips...");
    let encoder = FfmpegEncoder::new(&settings.render.ffmpeg, &settings.render.ffprobe);
    let rendered = render_workspace(&report.selection, workspace, &encoder).await?;
    spinner.finish_with_message(format!(
        "{} Rendered {} of {} clips {}",
        ok_mark(),
        rendered.rendered.len(),
        report.selection.len(),
        elapsed(step_start)
    ));

    for skipped in &rendered.skipped {
        println!(
            "  {} {}: {}",
            fail_mark(),
            skipped.segment_name,
            skipped.reason
        );
    }

    println!("{}", style("─".repeat(60)).dim());
    for clip in rendered.rendered.iter().filter(|c| c.path.exists()) {
        println!(
            "\n{}  {}",
            style(&clip.segment_name).cyan().bold(),
            style(clip.path.display()).dim()
        );
        if !clip.caption.is_empty() {
            println!("{}", clip.caption);
        }
        if !clip.hashtags.is_empty() {
            println!("{}", style(clip.hashtags.join(" ")).blue());
        }
    }
    println!();

    Ok(())
}
