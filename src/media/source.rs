use std::path::Path;

use crate::foundation::core::Fps;
use crate::foundation::error::ReelResult;
use crate::media::pool::{AudioAsset, VideoAsset};

/// Probed metadata for a source clip.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Container duration in seconds; NaN when the probe could not determine it.
    pub duration_sec: f64,
    pub has_audio: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioInfo {
    pub duration_sec: f64,
}

/// A decoded source picture in straight-alpha RGBA8.
#[derive(Clone, Debug)]
pub struct SourceFrame {
    /// Playback position of this picture.
    pub pts_sec: f64,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Result of pulling the next tick from a playing clip.
#[derive(Clone, Debug)]
pub enum FrameEvent {
    Frame(SourceFrame),
    /// Playback advanced to `pts_sec` but no decodable picture is ready.
    NotReady { pts_sec: f64 },
    /// Playback was paused from outside the render loop.
    Paused,
    EndOfStream,
}

/// Pull-based video playback. Each call to `next_frame` is one tick of the render loop.
pub trait VideoPlayback: Send {
    fn next_frame(&mut self) -> ReelResult<FrameEvent>;
    /// Stop playback and release decoder resources. Must be idempotent.
    fn stop(&mut self);
}

/// Pull-based audio playback producing interleaved stereo `f32` at
/// [`MIX_SAMPLE_RATE`](crate::audio::mix::MIX_SAMPLE_RATE).
pub trait AudioPlayback: Send {
    /// Fill `out` and return the number of samples written. A short count means the stream
    /// reached its end.
    fn read(&mut self, out: &mut [f32]) -> ReelResult<usize>;
    fn ended(&self) -> bool;
    /// Must be idempotent.
    fn stop(&mut self);
}

/// Probing and decoding collaborator behind the job queue.
pub trait MediaBackend: Send {
    fn probe_video(&mut self, asset: &VideoAsset) -> ReelResult<VideoInfo>;
    fn probe_audio(&mut self, asset: &AudioAsset) -> ReelResult<AudioInfo>;
    /// Start playback of `asset`, emitting one tick per output frame at `fps`.
    fn open_video(
        &mut self,
        asset: &VideoAsset,
        info: &VideoInfo,
        fps: Fps,
    ) -> ReelResult<Box<dyn VideoPlayback>>;
    /// Start playback of the audio track of any media file (a clip's embedded track or an
    /// added-audio file).
    fn open_audio(&mut self, path: &Path) -> ReelResult<Box<dyn AudioPlayback>>;
}
