use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reelsmith::encode::codec::{AvailableEncoders, CodecProfile};
use reelsmith::encode::sink::{EncoderConfig, EncoderFactory, JobEncoder};
use reelsmith::media::source::{
    AudioInfo, AudioPlayback, FrameEvent, MediaBackend, SourceFrame, VideoInfo, VideoPlayback,
};
use reelsmith::render::overlay::{TextMeasure, layout_overlay};
use reelsmith::{
    AudioAsset, BundleSink, Canvas, Collaborators, Dataset, Eta, Fps, FrameCompositor, FrameIndex,
    FrameRGBA, JobQueueController, MediaPool, OutputFormat, OverlayStyle, ProgressStatus,
    ReelError, ReelResult, RenderConfig, Row, SessionOutcome, SessionState, VideoAsset,
};

const FPS: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Tick {
    Frame,
    NotReady,
}

#[derive(Clone)]
struct FakeMedia {
    video_sec: f64,
    /// Seconds the decoder actually delivers; defaults to the probed duration.
    playable_sec: Option<f64>,
    video_has_audio: bool,
    /// Per opened added track: (duration seconds, constant sample value).
    added_tracks: Vec<(f64, f32)>,
    original_value: f32,
    /// Tick pattern, repeated; `None` reports `Paused`.
    ticks: Vec<Option<Tick>>,
    fail_probe_on: Option<usize>,
    probes: Arc<Mutex<usize>>,
    added_opens: Arc<Mutex<usize>>,
}

impl FakeMedia {
    fn new(video_sec: f64) -> Self {
        Self {
            video_sec,
            playable_sec: None,
            video_has_audio: false,
            added_tracks: Vec::new(),
            original_value: 0.0,
            ticks: vec![Some(Tick::Frame)],
            fail_probe_on: None,
            probes: Arc::new(Mutex::new(0)),
            added_opens: Arc::new(Mutex::new(0)),
        }
    }
}

struct FakeVideo {
    ticks: Vec<Option<Tick>>,
    emitted: u64,
    total: u64,
    fps: Fps,
}

impl VideoPlayback for FakeVideo {
    fn next_frame(&mut self) -> ReelResult<FrameEvent> {
        if self.emitted >= self.total {
            return Ok(FrameEvent::EndOfStream);
        }
        let pos = self.emitted as usize;
        let tick = self.ticks[pos % self.ticks.len()];
        let pts_sec = self.fps.frames_to_secs(self.emitted);
        self.emitted += 1;
        Ok(match tick {
            Some(Tick::Frame) => FrameEvent::Frame(SourceFrame {
                pts_sec,
                width: 16,
                height: 9,
                rgba: vec![200; 16 * 9 * 4],
            }),
            Some(Tick::NotReady) => FrameEvent::NotReady { pts_sec },
            None => FrameEvent::Paused,
        })
    }

    fn stop(&mut self) {}
}

struct ConstantAudio {
    value: f32,
    remaining: usize,
}

impl AudioPlayback for ConstantAudio {
    fn read(&mut self, out: &mut [f32]) -> ReelResult<usize> {
        let n = out.len().min(self.remaining);
        out[..n].fill(self.value);
        self.remaining -= n;
        Ok(n)
    }

    fn ended(&self) -> bool {
        self.remaining == 0
    }

    fn stop(&mut self) {
        self.remaining = 0;
    }
}

fn samples_for(sec: f64) -> usize {
    (sec * 48_000.0) as usize * 2
}

impl MediaBackend for FakeMedia {
    fn probe_video(&mut self, asset: &VideoAsset) -> ReelResult<VideoInfo> {
        let mut probes = self.probes.lock().unwrap();
        *probes += 1;
        if self.fail_probe_on == Some(*probes) {
            return Err(ReelError::asset_unavailable(format!(
                "cannot probe '{}'",
                asset.name
            )));
        }
        Ok(VideoInfo {
            width: 16,
            height: 9,
            duration_sec: self.video_sec,
            has_audio: self.video_has_audio,
        })
    }

    fn probe_audio(&mut self, _asset: &AudioAsset) -> ReelResult<AudioInfo> {
        let next = *self.added_opens.lock().unwrap();
        let (duration_sec, _) = self.added_tracks[next.min(self.added_tracks.len() - 1)];
        Ok(AudioInfo { duration_sec })
    }

    fn open_video(
        &mut self,
        _asset: &VideoAsset,
        info: &VideoInfo,
        fps: Fps,
    ) -> ReelResult<Box<dyn VideoPlayback>> {
        let sec = self.playable_sec.unwrap_or(info.duration_sec);
        Ok(Box::new(FakeVideo {
            ticks: self.ticks.clone(),
            emitted: 0,
            total: (sec * fps.as_f64()).ceil() as u64,
            fps,
        }))
    }

    fn open_audio(&mut self, path: &Path) -> ReelResult<Box<dyn AudioPlayback>> {
        if path.extension().is_some_and(|e| e == "mp4") {
            return Ok(Box::new(ConstantAudio {
                value: self.original_value,
                remaining: samples_for(self.video_sec),
            }));
        }
        let mut opens = self.added_opens.lock().unwrap();
        let (sec, value) = self.added_tracks[(*opens).min(self.added_tracks.len() - 1)];
        *opens += 1;
        Ok(Box::new(ConstantAudio {
            value,
            remaining: samples_for(sec),
        }))
    }
}

/// Every character advances half the font size.
struct HalfEm;

impl TextMeasure for HalfEm {
    fn line_width(&mut self, _family: &str, size_px: f32, text: &str) -> ReelResult<f32> {
        Ok(text.chars().count() as f32 * size_px * 0.5)
    }
}

#[derive(Debug, Default)]
struct ComposeLog {
    composes: usize,
    missing_source: usize,
    /// Overlay lines per distinct row, in the order rows were first seen.
    layouts: Vec<Vec<Vec<String>>>,
}

struct LayoutCompositor {
    canvas: Canvas,
    overlays: Vec<OverlayStyle>,
    frame: FrameRGBA,
    last_row: Option<Row>,
    log: Arc<Mutex<ComposeLog>>,
}

impl LayoutCompositor {
    fn new(cfg: &RenderConfig, log: Arc<Mutex<ComposeLog>>) -> Self {
        let canvas = cfg.canvas();
        Self {
            canvas,
            overlays: cfg.overlays.clone(),
            frame: FrameRGBA {
                width: canvas.width,
                height: canvas.height,
                data: Vec::new(),
                premultiplied: true,
            },
            last_row: None,
            log,
        }
    }
}

impl FrameCompositor for LayoutCompositor {
    fn canvas(&self) -> Canvas {
        self.canvas
    }

    fn compose(&mut self, source: Option<&SourceFrame>, row: &Row) -> ReelResult<()> {
        let mut log = self.log.lock().unwrap();
        log.composes += 1;
        if source.is_none() {
            log.missing_source += 1;
        }
        if self.last_row.as_ref() != Some(row) {
            let mut lines = Vec::new();
            for (i, style) in self.overlays.iter().enumerate() {
                let text = row.cell(i).unwrap_or("");
                if let Some(layout) = layout_overlay(style, text, self.canvas, &mut HalfEm)? {
                    lines.push(layout.line_texts().iter().map(|s| s.to_string()).collect());
                }
            }
            log.layouts.push(lines);
            self.last_row = Some(row.clone());
        }
        Ok(())
    }

    fn frame(&self) -> &FrameRGBA {
        &self.frame
    }
}

#[derive(Debug, Default)]
struct EncodedJob {
    frames: Vec<u64>,
    audio: Vec<f32>,
    finished: bool,
    aborted: bool,
}

struct RecordingEncoder {
    log: Arc<Mutex<Vec<EncodedJob>>>,
    slot: usize,
    profile: Option<CodecProfile>,
}

impl JobEncoder for RecordingEncoder {
    fn begin(&mut self, cfg: EncoderConfig) -> ReelResult<()> {
        cfg.validate()?;
        self.profile = Some(cfg.profile);
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _frame: &FrameRGBA) -> ReelResult<()> {
        self.log.lock().unwrap()[self.slot].frames.push(idx.0);
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> ReelResult<()> {
        self.log.lock().unwrap()[self.slot]
            .audio
            .extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> ReelResult<Vec<u8>> {
        let mut log = self.log.lock().unwrap();
        let job = &mut log[self.slot];
        job.finished = true;
        let mime = self.profile.map(|p| p.base_mime()).unwrap_or("none");
        Ok(format!("{mime} frames={}", job.frames.len()).into_bytes())
    }

    fn abort(&mut self) {
        self.log.lock().unwrap()[self.slot].aborted = true;
    }
}

type CreateHook = Box<dyn FnMut(usize) + Send>;

struct RecordingFactory {
    names: Vec<&'static str>,
    log: Arc<Mutex<Vec<EncodedJob>>>,
    on_create: Option<CreateHook>,
}

impl EncoderFactory for RecordingFactory {
    fn available(&mut self) -> ReelResult<AvailableEncoders> {
        Ok(AvailableEncoders::from_names(self.names.iter().copied()))
    }

    fn create(&mut self) -> ReelResult<Box<dyn JobEncoder>> {
        let slot = {
            let mut log = self.log.lock().unwrap();
            log.push(EncodedJob::default());
            log.len() - 1
        };
        if let Some(hook) = self.on_create.as_mut() {
            hook(slot + 1);
        }
        Ok(Box::new(RecordingEncoder {
            log: Arc::clone(&self.log),
            slot,
            profile: None,
        }))
    }
}

struct Harness {
    cfg: RenderConfig,
    rows: Vec<Vec<&'static str>>,
    media: FakeMedia,
    with_audio_pool: bool,
    encoder_names: Vec<&'static str>,
    on_create: Option<CreateHook>,
    handle_slot: Arc<Mutex<Option<reelsmith::SessionHandle>>>,
}

struct Outcome {
    report: reelsmith::SessionReport,
    sink: BundleSink,
    statuses: Vec<ProgressStatus>,
    encoded: Arc<Mutex<Vec<EncodedJob>>>,
    composed: Arc<Mutex<ComposeLog>>,
    final_status: ProgressStatus,
}

fn base_config() -> RenderConfig {
    RenderConfig {
        fps: FPS,
        pause_poll_ms: 5,
        selection_seed: Some(7),
        ..RenderConfig::default()
    }
}

impl Harness {
    fn new(rows: Vec<Vec<&'static str>>, media: FakeMedia) -> Self {
        Self {
            cfg: base_config(),
            rows,
            media,
            with_audio_pool: false,
            encoder_names: vec!["libvpx", "libopus"],
            on_create: None,
            handle_slot: Arc::new(Mutex::new(None)),
        }
    }

    fn run(self) -> Outcome {
        let dataset =
            Dataset::new(self.rows.iter().map(|r| Row::new(r.clone())).collect()).unwrap();
        let audio = if self.with_audio_pool {
            vec![AudioAsset::from_path("song.mp3")]
        } else {
            Vec::new()
        };
        let pool = MediaPool::new(vec![VideoAsset::from_path("clip.mp4")], audio).unwrap();

        let composed = Arc::new(Mutex::new(ComposeLog::default()));
        let encoded = Arc::new(Mutex::new(Vec::new()));
        let parts = Collaborators {
            media: Box::new(self.media),
            compositor: Box::new(LayoutCompositor::new(&self.cfg, Arc::clone(&composed))),
            encoders: Box::new(RecordingFactory {
                names: self.encoder_names,
                log: Arc::clone(&encoded),
                on_create: self.on_create,
            }),
        };
        let mut controller = JobQueueController::new(self.cfg, dataset, pool, parts).unwrap();
        let handle = controller.handle();
        *self.handle_slot.lock().unwrap() = Some(handle.clone());

        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&statuses);
        handle.subscribe(move |s: &ProgressStatus| seen.lock().unwrap().push(s.clone()));

        let mut sink = BundleSink::new();
        let report = controller.run(&mut sink).unwrap();
        let statuses = statuses.lock().unwrap().clone();
        Outcome {
            report,
            sink,
            statuses,
            encoded,
            composed,
            final_status: handle.status(),
        }
    }
}

fn progress_points(statuses: &[ProgressStatus]) -> Vec<(u8, Eta)> {
    let mut out: Vec<(u8, Eta)> = Vec::new();
    let mut last_completed = 0;
    for s in statuses {
        if s.completed > last_completed
            && let Some(eta) = s.eta
        {
            out.push((s.percentage, eta));
            last_completed = s.completed;
        }
    }
    out
}

#[test]
fn five_rows_report_progress_in_fifths() {
    let rows = vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"], vec!["e"]];
    let out = Harness::new(rows, FakeMedia::new(1.0)).run();

    assert_eq!(out.report.outcome, SessionOutcome::Completed);
    let points = progress_points(&out.statuses);
    let pcts: Vec<u8> = points.iter().map(|(p, _)| *p).collect();
    assert_eq!(pcts, vec![20, 40, 60, 80, 100]);
    for (_, eta) in &points[..4] {
        assert!(matches!(eta, Eta::Remaining(_)), "expected remaining ETA, got {eta:?}");
    }
    assert_eq!(points[4].1, Eta::Finishing);

    assert_eq!(out.final_status.state, SessionState::Finished);
    assert_eq!(out.final_status.status, "All videos processed!");
    assert_eq!(out.final_status.eta, None);
    assert_eq!(out.final_status.percentage, 100);
}

#[test]
fn artifacts_are_named_by_row_and_listed_newest_first() {
    let rows = vec![vec!["a"], vec!["b"], vec!["c"]];
    let out = Harness::new(rows, FakeMedia::new(1.0)).run();

    let names: Vec<&str> = out.sink.artifacts().iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["1.webm", "2.webm", "3.webm"]);
    let recent: Vec<&str> = out.report.completed.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(recent, vec!["3.webm", "2.webm", "1.webm"]);
    assert_eq!(out.report.profile, Some(CodecProfile::WEBM_VP8_OPUS));
    for a in out.sink.artifacts() {
        assert_eq!(a.mime, "video/webm");
        assert!((a.duration_sec - 1.0).abs() < 1e-9);
    }
}

#[test]
fn two_row_batch_wraps_each_rows_overlay() {
    let mut harness = Harness::new(
        vec![vec!["Hello World"], vec!["Foo Bar Baz Qux"]],
        FakeMedia::new(5.0),
    );
    let mut overlay = OverlayStyle::defaults_for_columns(1).remove(0);
    overlay.words_per_line = 2;
    harness.cfg.overlays = vec![overlay];
    let out = harness.run();

    assert_eq!(out.report.outcome, SessionOutcome::Completed);
    assert_eq!(out.sink.artifacts().len(), 2);
    for a in out.sink.artifacts() {
        assert!(a.duration_sec <= 5.0 + 1e-9, "{} lasts {}", a.filename, a.duration_sec);
    }
    let layouts = &out.composed.lock().unwrap().layouts;
    assert_eq!(layouts.len(), 2);
    assert_eq!(layouts[0], vec![vec!["Hello World".to_string()]]);
    assert_eq!(
        layouts[1],
        vec![vec!["Foo Bar".to_string(), "Baz Qux".to_string()]]
    );
}

#[test]
fn shorter_added_audio_caps_the_job_and_is_mixed_with_gains() {
    let mut media = FakeMedia::new(5.0);
    media.video_has_audio = true;
    media.original_value = 0.25;
    media.added_tracks = vec![(2.0, 0.5)];
    let mut harness = Harness::new(vec![vec!["x"]], media);
    harness.with_audio_pool = true;
    harness.cfg.video.volume = 0.4;
    harness.cfg.audio.volume = 1.0;
    let out = harness.run();

    let encoded = out.encoded.lock().unwrap();
    assert_eq!(encoded[0].frames.len(), 2 * FPS as usize);
    assert_eq!(encoded[0].audio.len(), samples_for(2.0));
    assert!(encoded[0].audio.iter().all(|s| (s - 0.6).abs() < 1e-6));
    assert!((out.sink.artifacts()[0].duration_sec - 2.0).abs() < 1e-9);
}

#[test]
fn second_job_hears_only_its_own_added_track() {
    let mut media = FakeMedia::new(1.0);
    media.added_tracks = vec![(1.0, 0.5), (1.0, -0.3)];
    let mut harness = Harness::new(vec![vec!["x"], vec!["y"]], media);
    harness.with_audio_pool = true;
    let out = harness.run();

    let encoded = out.encoded.lock().unwrap();
    assert_eq!(encoded.len(), 2);
    assert!(encoded[0].audio.iter().all(|s| (s - 0.5).abs() < 1e-6));
    assert!(!encoded[1].audio.is_empty());
    assert!(encoded[1].audio.iter().all(|s| (s + 0.3).abs() < 1e-6));
}

#[test]
fn stop_during_pause_exits_without_starting_another_job() {
    let mut harness = Harness::new(
        vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"], vec!["e"]],
        FakeMedia::new(0.5),
    );
    let slot = Arc::clone(&harness.handle_slot);
    harness.on_create = Some(Box::new(move |n| {
        if n != 2 {
            return;
        }
        let Some(handle) = slot.lock().unwrap().clone() else {
            return;
        };
        assert!(handle.pause());
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            handle.stop();
        });
    }));
    let out = harness.run();

    assert_eq!(out.report.outcome, SessionOutcome::Stopped);
    // Pause only takes effect between jobs, so job 2 still renders in full.
    let encoded = out.encoded.lock().unwrap();
    assert_eq!(encoded.len(), 2);
    assert!(encoded.iter().all(|j| j.finished && j.frames.len() == 5));
    assert_eq!(out.sink.artifacts().len(), 2);
    assert_eq!(out.report.completed.len(), 2);
    assert_eq!(out.final_status.state, SessionState::Stopping);
    assert_eq!(out.final_status.status, "Stopped!");
    assert!(
        out.statuses
            .iter()
            .any(|s| s.state == SessionState::Paused && s.status == "Processing paused...")
    );
}

#[test]
fn stop_while_paused_ends_within_one_poll_interval() {
    let mut harness = Harness::new(vec![vec!["a"], vec!["b"], vec!["c"]], FakeMedia::new(0.5));
    harness.cfg.pause_poll_ms = 200;
    let slot = Arc::clone(&harness.handle_slot);
    let stopped_at = Arc::new(Mutex::new(None::<Instant>));
    let stamp = Arc::clone(&stopped_at);
    harness.on_create = Some(Box::new(move |n| {
        if n != 1 {
            return;
        }
        let Some(handle) = slot.lock().unwrap().clone() else {
            return;
        };
        assert!(handle.pause());
        let stamp = Arc::clone(&stamp);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            *stamp.lock().unwrap() = Some(Instant::now());
            handle.stop();
        });
    }));
    let out = harness.run();
    let returned = Instant::now();

    assert_eq!(out.report.outcome, SessionOutcome::Stopped);
    assert_eq!(out.encoded.lock().unwrap().len(), 1);
    let stopped = stopped_at.lock().unwrap().expect("stop was issued");
    let waited = returned.duration_since(stopped);
    assert!(
        waited < Duration::from_millis(200 + 100),
        "run returned {waited:?} after stop"
    );
}

#[test]
fn stop_mid_job_still_finalizes_that_job() {
    let mut harness = Harness::new(vec![vec!["a"], vec!["b"]], FakeMedia::new(1.0));
    let slot = Arc::clone(&harness.handle_slot);
    harness.on_create = Some(Box::new(move |_| {
        if let Some(handle) = slot.lock().unwrap().as_ref() {
            handle.stop();
        }
    }));
    let out = harness.run();

    assert_eq!(out.report.outcome, SessionOutcome::Stopped);
    assert_eq!(out.sink.artifacts().len(), 1);
    assert_eq!(out.sink.artifacts()[0].filename, "1.webm");
    assert!(out.encoded.lock().unwrap()[0].finished);
}

#[test]
fn probe_failure_aborts_session_and_keeps_finished_artifacts() {
    let mut media = FakeMedia::new(1.0);
    media.fail_probe_on = Some(3);
    let out = Harness::new(vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]], media).run();

    let SessionOutcome::Failed(msg) = &out.report.outcome else {
        panic!("expected failure, got {:?}", out.report.outcome);
    };
    assert!(msg.contains("cannot probe"), "{msg}");
    assert_eq!(out.sink.artifacts().len(), 2);
    assert_eq!(out.report.completed.len(), 2);
    assert_eq!(out.final_status.state, SessionState::Finished);
    assert!(out.final_status.status.starts_with("Error: "));
    assert_eq!(out.encoded.lock().unwrap().len(), 2);
}

#[test]
fn missing_encoders_fail_before_any_job() {
    let mut harness = Harness::new(vec![vec!["a"]], FakeMedia::new(1.0));
    harness.encoder_names = vec!["aac"];
    let out = harness.run();

    assert!(matches!(out.report.outcome, SessionOutcome::Failed(_)));
    assert_eq!(out.report.profile, None);
    assert!(out.sink.is_empty());
    assert!(out.encoded.lock().unwrap().is_empty());
}

#[test]
fn mp4_request_falls_back_to_mpeg4() {
    let mut harness = Harness::new(vec![vec!["a"]], FakeMedia::new(1.0));
    harness.cfg.video.format = OutputFormat::Mp4;
    harness.encoder_names = vec!["mpeg4", "aac", "libvpx", "libopus"];
    let out = harness.run();

    assert_eq!(out.report.profile, Some(CodecProfile::MP4_MPEG4_AAC));
    assert_eq!(out.sink.artifacts()[0].filename, "1.mp4");
    assert_eq!(out.sink.artifacts()[0].mime, "video/mp4");
}

#[test]
fn not_ready_ticks_still_emit_frames() {
    let mut media = FakeMedia::new(1.0);
    media.ticks = vec![Some(Tick::Frame), Some(Tick::NotReady)];
    let out = Harness::new(vec![vec!["a"]], media).run();

    let composed = out.composed.lock().unwrap();
    assert_eq!(composed.composes, FPS as usize);
    assert_eq!(composed.missing_source, FPS as usize / 2);
    let frames = &out.encoded.lock().unwrap()[0].frames;
    assert_eq!(frames, &(0..u64::from(FPS)).collect::<Vec<_>>());
}

#[test]
fn paused_playback_ends_the_job_early() {
    let mut media = FakeMedia::new(1.0);
    media.ticks = vec![Some(Tick::Frame), Some(Tick::Frame), Some(Tick::Frame), None];
    let out = Harness::new(vec![vec!["a"], vec!["b"]], media).run();

    assert_eq!(out.report.outcome, SessionOutcome::Completed);
    let encoded = out.encoded.lock().unwrap();
    assert!(encoded.iter().all(|j| j.frames.len() == 3));
    assert!((out.sink.artifacts()[0].duration_sec - 0.3).abs() < 1e-9);
}

#[test]
fn a_finished_session_must_be_reset_before_rerunning() {
    let dataset = Dataset::new(vec![Row::new(["a"])]).unwrap();
    let pool = MediaPool::new(vec![VideoAsset::from_path("clip.mp4")], Vec::new()).unwrap();
    let cfg = base_config();
    let parts = Collaborators {
        media: Box::new(FakeMedia::new(0.5)),
        compositor: Box::new(LayoutCompositor::new(&cfg, Arc::default())),
        encoders: Box::new(RecordingFactory {
            names: vec!["libvpx", "libopus"],
            log: Arc::default(),
            on_create: None,
        }),
    };
    let mut controller = JobQueueController::new(cfg, dataset, pool, parts).unwrap();
    let mut sink = BundleSink::new();

    controller.run(&mut sink).unwrap();
    assert!(controller.run(&mut sink).is_err());

    controller.handle().reset().unwrap();
    assert_eq!(controller.handle().state(), SessionState::Idle);
    let report = controller.run(&mut sink).unwrap();
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(sink.artifacts().len(), 2);
}

#[test]
fn mismatched_compositor_canvas_is_rejected() {
    let dataset = Dataset::new(vec![Row::new(["a"])]).unwrap();
    let pool = MediaPool::new(vec![VideoAsset::from_path("clip.mp4")], Vec::new()).unwrap();
    let square = RenderConfig {
        video: reelsmith::config::VideoSettings {
            aspect_ratio: reelsmith::AspectRatio::Square,
            ..Default::default()
        },
        ..base_config()
    };
    let parts = Collaborators {
        media: Box::new(FakeMedia::new(0.5)),
        compositor: Box::new(LayoutCompositor::new(&square, Arc::default())),
        encoders: Box::new(RecordingFactory {
            names: vec!["libvpx", "libopus"],
            log: Arc::default(),
            on_create: None,
        }),
    };
    assert!(JobQueueController::new(base_config(), dataset, pool, parts).is_err());
}

#[test]
fn unknown_video_duration_plays_until_the_decoder_ends() {
    let mut media = FakeMedia::new(f64::NAN);
    media.playable_sec = Some(0.8);
    let out = Harness::new(vec![vec!["a"]], media).run();

    assert_eq!(out.report.outcome, SessionOutcome::Completed);
    assert_eq!(out.encoded.lock().unwrap()[0].frames.len(), 8);
    assert!((out.sink.artifacts()[0].duration_sec - 0.8).abs() < 1e-9);
}

#[test]
fn unknown_video_duration_is_capped_by_added_audio() {
    let mut media = FakeMedia::new(f64::NAN);
    media.playable_sec = Some(3.0);
    media.added_tracks = vec![(0.5, 0.2)];
    let mut harness = Harness::new(vec![vec!["a"]], media);
    harness.with_audio_pool = true;
    let out = harness.run();

    assert_eq!(out.encoded.lock().unwrap()[0].frames.len(), 5);
    assert!((out.sink.artifacts()[0].duration_sec - 0.5).abs() < 1e-9);
}

#[test]
fn zero_video_duration_yields_an_empty_but_finalized_job() {
    let mut media = FakeMedia::new(0.0);
    media.playable_sec = Some(2.0);
    media.added_tracks = vec![(1.0, 0.2)];
    let mut harness = Harness::new(vec![vec!["a"], vec!["b"]], media);
    harness.with_audio_pool = true;
    let out = harness.run();

    assert_eq!(out.report.outcome, SessionOutcome::Completed);
    let encoded = out.encoded.lock().unwrap();
    assert_eq!(encoded.len(), 2);
    assert!(encoded.iter().all(|j| j.finished && j.frames.is_empty()));
    assert!(out.sink.artifacts().iter().all(|a| a.duration_sec == 0.0));
}
