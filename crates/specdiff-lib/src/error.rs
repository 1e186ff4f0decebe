use thiserror::Error;

/// Failure modes of the PSD pipeline.
#[derive(Debug, Error)]
pub enum PsdError {
    /// The input file could not be interpreted as a windowed recording.
    #[error("file format: {0}")]
    FileFormat(String),
    /// A window/segmentation parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The two comparison sides produced frequency axes that do not align.
    #[error(
        "join mismatch: {left_only} rows only in side A, {right_only} rows only in side B; \
         both sides must use the same segment length"
    )]
    JoinMismatch { left_only: usize, right_only: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PsdError>;
