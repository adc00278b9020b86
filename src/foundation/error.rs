pub type ReelResult<T> = Result<T, ReelError>;

#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Selected media could not be probed or decoded.
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    /// No entry of the codec capability list is available in the runtime.
    #[error("encoder unsupported: {0}")]
    EncoderUnsupported(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset_unavailable(msg: impl Into<String>) -> Self {
        Self::AssetUnavailable(msg.into())
    }

    pub fn encoder_unsupported(msg: impl Into<String>) -> Self {
        Self::EncoderUnsupported(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for ReelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}
