use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store timeout: {0}")]
    StoreTimeout(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Data-layer failures are retryable from the caller's point of view;
    /// everything else is a bug or bad input for this request only.
    pub fn is_data_layer(&self) -> bool {
        matches!(
            self,
            EngineError::StoreUnavailable(_)
                | EngineError::StoreTimeout(_)
                | EngineError::MalformedRow(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
