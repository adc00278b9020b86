use crate::dataset::Row;
use crate::foundation::core::Canvas;
use crate::foundation::error::ReelResult;
use crate::media::source::SourceFrame;

/// Cover-fit crop math.
pub mod cover;
/// CPU compositor built on vello_cpu.
pub mod cpu;
/// Overlay line geometry for box and stroke styles.
pub mod overlay;
/// Word wrapping and Parley shaping.
pub mod text;

#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

/// Renders one output frame per tick at fixed canvas dimensions.
pub trait FrameCompositor: Send {
    fn canvas(&self) -> Canvas;

    /// Compose the next frame. `source` is `None` when no decoded frame is ready for this tick;
    /// the background and overlays are still drawn.
    fn compose(&mut self, source: Option<&SourceFrame>, row: &Row) -> ReelResult<()>;

    /// The most recently composed frame.
    fn frame(&self) -> &FrameRGBA;
}
