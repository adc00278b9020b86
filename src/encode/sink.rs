use std::path::Path;

use crate::audio::mix::{MIX_CHANNELS, MIX_SAMPLE_RATE};
use crate::encode::codec::{AvailableEncoders, CodecProfile};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::FrameRGBA;

/// Interleaved `f32` PCM layout accepted by [`JobEncoder::push_audio`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioTrackConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioTrackConfig {
    fn default() -> Self {
        Self {
            sample_rate: MIX_SAMPLE_RATE,
            channels: MIX_CHANNELS,
        }
    }
}

/// Configuration provided to a [`JobEncoder`] at the start of a job.
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub video_bitrate: u32,
    pub profile: CodecProfile,
    pub audio: AudioTrackConfig,
}

impl EncoderConfig {
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::validation("encoder width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "encoder width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(ReelError::validation("fps must be non-zero"));
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            return Err(ReelError::validation(
                "audio sample_rate/channels must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Per-job encoder contract.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order. Every
/// `begin` is matched by exactly one `finish` or `abort`.
pub trait JobEncoder: Send {
    fn begin(&mut self, cfg: EncoderConfig) -> ReelResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()>;
    /// Append interleaved samples in the layout given by [`EncoderConfig::audio`].
    fn push_audio(&mut self, samples: &[f32]) -> ReelResult<()>;
    /// Finalize the container and return its bytes.
    fn finish(&mut self) -> ReelResult<Vec<u8>>;
    /// Drop any in-flight output. Safe to call when nothing was started.
    fn abort(&mut self);
}

/// Source of per-job encoders plus the capability list used for codec negotiation.
pub trait EncoderFactory: Send {
    fn available(&mut self) -> ReelResult<AvailableEncoders>;
    fn create(&mut self) -> ReelResult<Box<dyn JobEncoder>>;
}

/// Re-encodes the embedded audio track of a media file.
pub trait AudioTranscoder: Send {
    fn transcode_audio(&mut self, source: &Path, bitrate_bps: u32) -> ReelResult<Vec<u8>>;
}

/// In-memory encoder for tests and debugging. The payload is a short text summary.
#[derive(Debug, Default)]
pub struct InMemoryEncoder {
    cfg: Option<EncoderConfig>,
    frames: Vec<FrameIndex>,
    audio_samples: usize,
    last_frame: Option<FrameRGBA>,
}

impl InMemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[FrameIndex] {
        &self.frames
    }

    pub fn audio_samples(&self) -> usize {
        self.audio_samples
    }

    pub fn last_frame(&self) -> Option<&FrameRGBA> {
        self.last_frame.as_ref()
    }
}

impl JobEncoder for InMemoryEncoder {
    fn begin(&mut self, cfg: EncoderConfig) -> ReelResult<()> {
        cfg.validate()?;
        self.cfg = Some(cfg);
        self.frames.clear();
        self.audio_samples = 0;
        self.last_frame = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::render("encoder not started"))?;
        if let Some(last) = self.frames.last()
            && idx.0 <= last.0
        {
            return Err(ReelError::render("encoder received out-of-order frame index"));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        self.frames.push(idx);
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn push_audio(&mut self, samples: &[f32]) -> ReelResult<()> {
        if self.cfg.is_none() {
            return Err(ReelError::render("encoder not started"));
        }
        self.audio_samples += samples.len();
        Ok(())
    }

    fn finish(&mut self) -> ReelResult<Vec<u8>> {
        let cfg = self
            .cfg
            .take()
            .ok_or_else(|| ReelError::render("encoder not started"))?;
        Ok(format!(
            "{} {}x{} frames={} samples={}",
            cfg.profile.base_mime(),
            cfg.width,
            cfg.height,
            self.frames.len(),
            self.audio_samples
        )
        .into_bytes())
    }

    fn abort(&mut self) {
        self.cfg = None;
    }
}
