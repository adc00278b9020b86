#![forbid(unsafe_code)]

mod foundation;

pub mod artifact;
pub mod audio;
pub mod config;
pub mod dataset;
pub mod encode;
pub mod media;
pub mod render;
pub mod session;

pub use artifact::{Artifact, ArtifactRecord, ArtifactSink, BundleSink};
pub use config::{AspectRatio, OutputFormat, OverlayStyle, RenderConfig, StyleVariant};
pub use dataset::{Dataset, Row};
pub use foundation::core::{Canvas, Fps, FrameIndex, Rect, Rgba8};
pub use foundation::error::{ReelError, ReelResult};
pub use media::pool::{AudioAsset, MediaPool, VideoAsset};
pub use render::{FrameCompositor, FrameRGBA};
pub use session::extract::{AudioExtractionPipeline, Quality};
pub use session::queue::{Collaborators, JobQueueController, SessionReport};
pub use session::state::{Eta, ProgressStatus, SessionHandle, SessionOutcome, SessionState};
