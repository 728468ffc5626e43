use thiserror::Error;

/// Cataloger error types.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unrecognized candle time: {0}")]
    MalformedTimestamp(String),

    #[error("Candle source error: {0}")]
    Source(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Whether the error came from the candle feed rather than from local input.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            CatalogError::Source(_) | CatalogError::Reqwest(_) | CatalogError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
