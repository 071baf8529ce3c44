use azqr_core::domain::{ScanError, StageConfigError};
use azqr_core::infrastructure::http::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    StageConfig(#[from] StageConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("number of resources ({count}) exceeds the report limit of {limit} rows")]
    TooManyResources { count: usize, limit: usize },

    #[error("{0} used before the initialization stage")]
    NotInitialized(&'static str),

    #[error("failed to render {format} report: {message}")]
    Render { format: &'static str, message: String },

    #[error("scan cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            PipelineError::Cancelled => true,
            PipelineError::Client(e) => e.is_cancelled(),
            PipelineError::Scan(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
