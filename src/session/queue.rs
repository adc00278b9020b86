use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::artifact::{Artifact, ArtifactRecord, ArtifactSink, artifact_filename};
use crate::audio::mix::{AudioMixGraph, JobAudio, MIX_CHANNELS, MIX_SAMPLE_RATE, MixDestination};
use crate::config::RenderConfig;
use crate::dataset::Dataset;
use crate::encode::codec::{CodecProfile, negotiate};
use crate::encode::sink::{AudioTrackConfig, EncoderConfig, EncoderFactory, JobEncoder};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::frame_to_sample;
use crate::media::pool::{AudioAsset, MediaPool, VideoAsset};
use crate::media::source::{FrameEvent, MediaBackend, VideoInfo, VideoPlayback};
use crate::render::FrameCompositor;
use crate::session::progress::ProgressTracker;
use crate::session::state::{SessionHandle, SessionOutcome, SessionState};

/// Seconds of output for a job.
///
/// The shorter of the two tracks when added audio is present and both durations are finite and
/// positive; otherwise the video duration, which may itself be NaN or zero.
pub fn resolve_duration(video_sec: f64, audio_sec: Option<f64>) -> f64 {
    let resolved = match audio_sec {
        Some(audio) => video_sec.min(audio),
        None => video_sec,
    };
    if resolved.is_finite() && resolved > 0.0 {
        resolved
    } else {
        video_sec
    }
}

/// One (row, video, audio) triple. Lives for the duration of its render.
#[derive(Clone, Debug)]
pub struct Job {
    pub row_index: usize,
    pub video: VideoAsset,
    pub video_info: VideoInfo,
    pub audio: Option<AudioAsset>,
    pub duration_sec: f64,
}

/// Why a job's render loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    DurationReached,
    VideoEnded,
    AudioEnded,
    PlaybackPaused,
    StopRequested,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Most recent first.
    pub completed: Vec<ArtifactRecord>,
    /// Negotiated output profile; `None` when negotiation itself failed.
    pub profile: Option<CodecProfile>,
}

/// External collaborators the controller drives.
pub struct Collaborators {
    pub media: Box<dyn MediaBackend>,
    pub compositor: Box<dyn FrameCompositor>,
    pub encoders: Box<dyn EncoderFactory>,
}

/// Drives a batch: one job per dataset row, strictly in row order, one job at a time.
pub struct JobQueueController {
    cfg: RenderConfig,
    fps: Fps,
    dataset: Dataset,
    pool: MediaPool,
    media: Box<dyn MediaBackend>,
    compositor: Box<dyn FrameCompositor>,
    encoders: Box<dyn EncoderFactory>,
    mix: AudioMixGraph,
    rng: StdRng,
    handle: SessionHandle,
    completed: Vec<ArtifactRecord>,
}

impl JobQueueController {
    pub fn new(
        cfg: RenderConfig,
        dataset: Dataset,
        pool: MediaPool,
        parts: Collaborators,
    ) -> ReelResult<Self> {
        cfg.validate()?;
        let fps = cfg.fps()?;
        if parts.compositor.canvas() != cfg.canvas() {
            return Err(ReelError::validation(
                "compositor canvas does not match the configured aspect ratio",
            ));
        }
        let rng = match cfg.selection_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            cfg,
            fps,
            dataset,
            pool,
            media: parts.media,
            compositor: parts.compositor,
            encoders: parts.encoders,
            mix: AudioMixGraph::new(),
            rng,
            handle: SessionHandle::new(),
            completed: Vec::new(),
        })
    }

    /// Control surface usable from other threads while [`Self::run`] blocks.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Records of artifacts handed off so far, most recent first.
    pub fn completed(&self) -> &[ArtifactRecord] {
        &self.completed
    }

    /// Run the whole batch.
    ///
    /// Fails only when the session cannot start. Errors inside a job end the session with
    /// [`SessionOutcome::Failed`]; artifacts already handed to `sink` stay there.
    pub fn run(&mut self, sink: &mut dyn ArtifactSink) -> ReelResult<SessionReport> {
        self.handle.begin(self.dataset.len())?;
        self.completed.clear();
        tracing::info!(rows = self.dataset.len(), "session started");

        let mut profile = None;
        let result = self.encoders.available().and_then(|found| {
            let chosen = negotiate(self.cfg.video.format, &found)?;
            profile = Some(chosen);
            self.run_jobs(chosen, sink)
        });

        let outcome = match result {
            Ok(()) if self.handle.stop_requested() => SessionOutcome::Stopped,
            Ok(()) => SessionOutcome::Completed,
            Err(e) => {
                tracing::warn!(error = %e, "session aborted");
                SessionOutcome::Failed(e.to_string())
            }
        };
        self.handle.end(&outcome);
        tracing::info!(?outcome, completed = self.completed.len(), "session ended");
        Ok(SessionReport {
            outcome,
            completed: self.completed.clone(),
            profile,
        })
    }

    fn run_jobs(&mut self, profile: CodecProfile, sink: &mut dyn ArtifactSink) -> ReelResult<()> {
        let total = self.dataset.len();
        let started = Instant::now();
        let mut tracker = ProgressTracker::new(total);

        for row_index in 0..total {
            if self.handle.stop_requested() || !self.wait_while_paused() {
                break;
            }

            let job = self.select_job(row_index)?;
            self.handle.set_status_text(format!(
                "Processing {}/{}: {}...",
                row_index + 1,
                total,
                job.video.name
            ));

            let artifact = self.render_job(&job, profile)?;
            let record = artifact.record();
            sink.put(artifact)?;
            self.completed.insert(0, record);

            let update = tracker.complete_job(started.elapsed());
            self.handle
                .set_progress(update.completed, update.percentage, update.eta);
        }
        Ok(())
    }

    /// Poll while paused. Returns `false` when a stop arrives.
    fn wait_while_paused(&self) -> bool {
        let interval = self.cfg.pause_poll_interval();
        loop {
            match self.handle.state() {
                SessionState::Paused => std::thread::sleep(interval),
                SessionState::Stopping => return false,
                _ => return true,
            }
        }
    }

    fn select_job(&mut self, row_index: usize) -> ReelResult<Job> {
        let video = self.pool.pick_video(&mut self.rng).clone();
        let audio = self.pool.pick_audio(&mut self.rng).cloned();

        let video_info = self.media.probe_video(&video)?;
        let audio_sec = match &audio {
            Some(a) => Some(self.media.probe_audio(a)?.duration_sec),
            None => None,
        };
        let duration_sec = resolve_duration(video_info.duration_sec, audio_sec);
        Ok(Job {
            row_index,
            video,
            video_info,
            audio,
            duration_sec,
        })
    }

    #[tracing::instrument(skip_all, fields(row = job.row_index, video = %job.video.name))]
    fn render_job(&mut self, job: &Job, profile: CodecProfile) -> ReelResult<Artifact> {
        let canvas = self.compositor.canvas();
        let mut encoder = self.encoders.create()?;
        encoder.begin(EncoderConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.fps,
            video_bitrate: self.cfg.video_bitrate,
            profile,
            audio: AudioTrackConfig::default(),
        })?;

        let (frames, exit) = match self.play_job(job, encoder.as_mut()) {
            Ok(played) => played,
            Err(e) => {
                encoder.abort();
                return Err(e);
            }
        };
        let payload = encoder.finish()?;
        let duration_sec = self.fps.frames_to_secs(frames);
        tracing::info!(frames, duration_sec, ?exit, bytes = payload.len(), "job encoded");

        Ok(Artifact {
            sequence: job.row_index + 1,
            filename: artifact_filename(job.row_index, profile.extension()),
            mime: profile.base_mime().to_string(),
            payload,
            duration_sec,
        })
    }

    /// Start playback, pump frames, then always stop playback and tear down the mix.
    fn play_job(
        &mut self,
        job: &Job,
        encoder: &mut dyn JobEncoder,
    ) -> ReelResult<(u64, LoopExit)> {
        let mut video = self.media.open_video(&job.video, &job.video_info, self.fps)?;
        let dest = match self.connect_audio(job) {
            Ok(dest) => dest,
            Err(e) => {
                video.stop();
                return Err(e);
            }
        };
        let pumped = self.pump(job, video.as_mut(), &dest, encoder);
        video.stop();
        self.mix.disconnect_job(dest);
        pumped
    }

    fn connect_audio(&mut self, job: &Job) -> ReelResult<MixDestination> {
        let original = if job.video_info.has_audio {
            Some(self.media.open_audio(&job.video.path)?)
        } else {
            None
        };
        let added = match &job.audio {
            Some(asset) => match self.media.open_audio(&asset.path) {
                Ok(playback) => Some((playback, self.cfg.audio.volume)),
                Err(e) => {
                    if let Some(mut original) = original {
                        original.stop();
                    }
                    return Err(e);
                }
            },
            None => None,
        };
        self.mix.connect_job(JobAudio {
            original,
            original_gain: self.cfg.video.volume,
            added,
        })
    }

    fn pump(
        &mut self,
        job: &Job,
        video: &mut dyn VideoPlayback,
        dest: &MixDestination,
        encoder: &mut dyn JobEncoder,
    ) -> ReelResult<(u64, LoopExit)> {
        let row = self
            .dataset
            .row(job.row_index)
            .ok_or_else(|| ReelError::render("job row index out of range"))?;
        let mut audio_buf = Vec::new();
        let mut idx = 0u64;

        let exit = loop {
            if self.handle.stop_requested() {
                break LoopExit::StopRequested;
            }
            if self.fps.frames_to_secs(idx) >= job.duration_sec {
                break LoopExit::DurationReached;
            }
            if self.mix.added_ended(dest) {
                break LoopExit::AudioEnded;
            }

            let source = match video.next_frame()? {
                FrameEvent::Frame(frame) => Some(frame),
                FrameEvent::NotReady { .. } => None,
                FrameEvent::Paused => break LoopExit::PlaybackPaused,
                FrameEvent::EndOfStream => break LoopExit::VideoEnded,
            };
            self.compositor.compose(source.as_ref(), row)?;
            encoder.push_frame(FrameIndex(idx), self.compositor.frame())?;

            let samples = frame_to_sample(idx + 1, self.fps, MIX_SAMPLE_RATE)
                - frame_to_sample(idx, self.fps, MIX_SAMPLE_RATE);
            audio_buf.resize(samples as usize * usize::from(MIX_CHANNELS), 0.0);
            self.mix.pull(dest, &mut audio_buf)?;
            encoder.push_audio(&audio_buf)?;
            idx += 1;
        };
        Ok((idx, exit))
    }
}
