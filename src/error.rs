//! Error types for configuration, backend setup and frame lifecycle

use thiserror::Error;

/// Config loading / saving / validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Serialize error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Backend construction and dispatch
#[derive(Debug, Error)]
pub enum BackendError {
    /// Worker pool could not be created; the renderer may fall back to scalar
    #[error("failed to build compute pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
    /// Storage buffer does not hold a whole number of vertices
    #[error("vertex buffer of {0} bytes is not a multiple of the vertex stride")]
    VertexBuffer(usize),
}

#[derive(Debug, Error)]
pub enum RasterError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no frame in progress; call begin_frame first")]
    FrameNotStarted,
    #[error("frame already in progress; call end_frame first")]
    FrameInProgress,
    #[error("invalid framebuffer dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
}

pub type Result<T> = std::result::Result<T, RasterError>;
