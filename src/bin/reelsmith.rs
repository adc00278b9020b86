use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use reelsmith::encode::ffmpeg::{FfmpegEncoders, FfmpegMp3Transcoder};
use reelsmith::media::ffmpeg::FfmpegMedia;
use reelsmith::media::source::{FrameEvent, MediaBackend, VideoPlayback};
use reelsmith::render::cpu::CpuCompositor;
use reelsmith::{
    AspectRatio, AudioAsset, AudioExtractionPipeline, BundleSink, Collaborators, Dataset,
    FrameCompositor, JobQueueController, MediaPool, OutputFormat, ProgressStatus, Quality,
    RenderConfig, SessionHandle, SessionOutcome, VideoAsset,
};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "m4v", "avi"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "oga", "m4a", "aac", "flac", "opus"];

#[derive(Parser, Debug)]
#[command(name = "reelsmith", version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one video per dataset row (requires `ffmpeg`/`ffprobe` on PATH).
    Render(RenderArgs),
    /// Re-encode the audio track of every video to MP3 and bundle them.
    ExtractAudio(ExtractArgs),
    /// Compose a single frame for one row as a PNG.
    Preview(PreviewArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Dataset JSON: an array of rows, each an array of cells.
    #[arg(long)]
    dataset: PathBuf,

    /// Video files or directories of videos.
    #[arg(long = "videos", required = true, num_args = 1..)]
    videos: Vec<PathBuf>,

    /// Added-audio files or directories.
    #[arg(long = "audio", num_args = 1..)]
    audio: Vec<PathBuf>,

    /// Render config JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for the bundle archive (and per-video files with --auto-download).
    #[arg(long, default_value = "out")]
    out: PathBuf,

    #[arg(long, value_enum)]
    aspect: Option<AspectChoice>,

    #[arg(long, value_enum)]
    format: Option<FormatChoice>,

    /// Write each video to the output directory as soon as it is encoded.
    #[arg(long)]
    auto_download: bool,

    /// Seed for random clip selection.
    #[arg(long)]
    seed: Option<u64>,

    /// Use the dataset's column count to propose overlays instead of the config's.
    #[arg(long)]
    default_overlays: bool,

    /// Font file used for every overlay family the config does not list.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Video files or directories of videos.
    #[arg(long = "videos", required = true, num_args = 1..)]
    videos: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = QualityChoice::Standard)]
    quality: QualityChoice,

    #[arg(long, default_value = "out")]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    #[arg(long)]
    dataset: PathBuf,

    #[arg(long)]
    video: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Row index (0-based).
    #[arg(long, default_value_t = 0)]
    row: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum)]
    aspect: Option<AspectChoice>,

    /// Font file used for every overlay family the config does not list.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AspectChoice {
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "1:1")]
    Square,
    #[value(name = "4:5")]
    Feed,
}

impl From<AspectChoice> for AspectRatio {
    fn from(value: AspectChoice) -> Self {
        match value {
            AspectChoice::Portrait => Self::Portrait,
            AspectChoice::Landscape => Self::Landscape,
            AspectChoice::Square => Self::Square,
            AspectChoice::Feed => Self::Feed,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Webm,
    Mp4,
}

impl From<FormatChoice> for OutputFormat {
    fn from(value: FormatChoice) -> Self {
        match value {
            FormatChoice::Webm => Self::Webm,
            FormatChoice::Mp4 => Self::Mp4,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityChoice {
    /// 128 kbps.
    Standard,
    /// 320 kbps.
    High,
}

impl From<QualityChoice> for Quality {
    fn from(value: QualityChoice) -> Self {
        match value {
            QualityChoice::Standard => Self::Standard,
            QualityChoice::High => Self::High,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::ExtractAudio(args) => cmd_extract(args),
        Command::Preview(args) => cmd_preview(args),
    }
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_config(path: Option<&Path>) -> anyhow::Result<RenderConfig> {
    let Some(path) = path else {
        return Ok(RenderConfig::default());
    };
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    RenderConfig::from_json_str(&s).with_context(|| format!("parse config '{}'", path.display()))
}

/// Register `font` under its file stem and make it the fallback family.
fn apply_font_override(cfg: &mut RenderConfig, font: Option<&Path>) -> anyhow::Result<()> {
    let Some(font) = font else {
        return Ok(());
    };
    let family = font
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("font path '{}' has no file name", font.display()))?
        .to_string();
    cfg.fonts.insert(family.clone(), font.to_path_buf());
    cfg.default_font = Some(family);
    Ok(())
}

/// Ctrl-C requests a graceful stop; a second Ctrl-C exits immediately.
fn stop_on_interrupt(handle: SessionHandle) {
    let spawned = std::thread::Builder::new()
        .name("reelsmith-interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!(error = %e, "interrupt handler unavailable");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                tracing::warn!("interrupt received, stopping after the current video");
                handle.stop();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "interrupt handler unavailable");
    }
}

fn read_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read dataset '{}'", path.display()))?;
    Dataset::from_json_str(&s).with_context(|| format!("parse dataset '{}'", path.display()))
}

/// Expand directories into their media files (sorted by name); plain files pass through.
fn collect_media(inputs: &[PathBuf], extensions: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            out.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in std::fs::read_dir(input)
            .with_context(|| format!("read directory '{}'", input.display()))?
        {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()));
            if path.is_file() && matches {
                found.push(path);
            }
        }
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

fn print_status(status: &ProgressStatus) {
    match &status.eta {
        Some(eta) => eprintln!(
            "[{:>3}%] {} ({}/{}, ETA {eta})",
            status.percentage, status.status, status.completed, status.total
        ),
        None => eprintln!("[{:>3}%] {}", status.percentage, status.status),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = read_config(args.config.as_deref())?;
    if let Some(aspect) = args.aspect {
        cfg.video.aspect_ratio = aspect.into();
    }
    if let Some(format) = args.format {
        cfg.video.format = format.into();
    }
    if args.seed.is_some() {
        cfg.selection_seed = args.seed;
    }
    cfg.auto_download |= args.auto_download;
    apply_font_override(&mut cfg, args.font.as_deref())?;

    let dataset = read_dataset(&args.dataset)?;
    if args.default_overlays {
        cfg.overlays = dataset.default_overlays();
    }

    let videos = collect_media(&args.videos, VIDEO_EXTENSIONS)?
        .into_iter()
        .map(VideoAsset::from_path)
        .collect();
    let audio = collect_media(&args.audio, AUDIO_EXTENSIONS)?
        .into_iter()
        .map(AudioAsset::from_path)
        .collect();
    let pool = MediaPool::new(videos, audio)?;

    let compositor = CpuCompositor::from_config(&cfg)?;
    let parts = Collaborators {
        media: Box::new(FfmpegMedia::new(cfg.realtime_playback)),
        compositor: Box::new(compositor),
        encoders: Box::new(FfmpegEncoders::new()),
    };
    let archive_name = cfg.archive_name.clone();
    let mut sink = if cfg.auto_download {
        BundleSink::with_auto_emit(&args.out)
    } else {
        BundleSink::new()
    };

    let mut controller = JobQueueController::new(cfg, dataset, pool, parts)?;
    controller.handle().subscribe(|status: &ProgressStatus| print_status(status));
    stop_on_interrupt(controller.handle());
    let report = controller.run(&mut sink)?;

    if !sink.is_empty() {
        let path = sink.flush_archive(&args.out, &archive_name)?;
        eprintln!("wrote {}", path.display());
    }
    match report.outcome {
        SessionOutcome::Failed(msg) => anyhow::bail!("render session failed: {msg}"),
        SessionOutcome::Completed | SessionOutcome::Stopped => Ok(()),
    }
}

fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let videos: Vec<VideoAsset> = collect_media(&args.videos, VIDEO_EXTENSIONS)?
        .into_iter()
        .map(VideoAsset::from_path)
        .collect();
    if videos.is_empty() {
        anyhow::bail!("no videos to extract audio from");
    }

    let mut pipeline = AudioExtractionPipeline::new(
        Box::new(FfmpegMedia::new(false)),
        Box::new(FfmpegMp3Transcoder),
        args.quality.into(),
    );
    pipeline.handle().subscribe(|status: &ProgressStatus| print_status(status));
    stop_on_interrupt(pipeline.handle());
    let extraction = pipeline.run(&videos)?;

    if !extraction.files.is_empty() {
        let path = extraction.write_archive(&args.out)?;
        eprintln!("wrote {}", path.display());
    }
    match extraction.outcome {
        SessionOutcome::Failed(msg) => anyhow::bail!("audio extraction failed: {msg}"),
        SessionOutcome::Completed | SessionOutcome::Stopped => Ok(()),
    }
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let mut cfg = read_config(args.config.as_deref())?;
    if let Some(aspect) = args.aspect {
        cfg.video.aspect_ratio = aspect.into();
    }
    apply_font_override(&mut cfg, args.font.as_deref())?;
    cfg.validate()?;
    let mut compositor = CpuCompositor::from_config(&cfg)?;
    let dataset = read_dataset(&args.dataset)?;
    let row = dataset
        .row(args.row)
        .with_context(|| format!("row {} out of range ({} rows)", args.row, dataset.len()))?;

    let mut media = FfmpegMedia::new(false);
    let asset = VideoAsset::from_path(&args.video);
    let info = media.probe_video(&asset)?;
    let mut playback = media.open_video(&asset, &info, cfg.fps()?)?;
    let mut source = None;
    for _ in 0..8 {
        match playback.next_frame()? {
            FrameEvent::Frame(frame) => {
                source = Some(frame);
                break;
            }
            FrameEvent::NotReady { .. } => continue,
            FrameEvent::Paused | FrameEvent::EndOfStream => break,
        }
    }
    playback.stop();

    compositor.compose(source.as_ref(), row)?;
    let frame = compositor.frame();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
