/// Ordered codec capability list and negotiation.
pub mod codec;
/// ffmpeg-backed job encoder and audio transcoder.
pub mod ffmpeg;
/// Encoder contracts and an in-memory encoder.
pub mod sink;
