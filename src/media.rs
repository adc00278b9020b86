/// `ffprobe`/`ffmpeg` backed probing and streaming decode.
pub mod ffmpeg;
/// Source pools and random selection.
pub mod pool;
/// Playback traits and probed metadata.
pub mod source;
