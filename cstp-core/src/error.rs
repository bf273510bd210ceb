use thiserror::Error;

#[derive(Debug, Error)]
pub enum CstpError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("I/O error for file '{0}': {1}")]
    FileIO(String, #[source] std::io::Error),

    #[error("Failed to write CSV record: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to encode JSON: {0}")]
    JsonEncoding(#[from] serde_json::Error),
}

impl CstpError {
    /// True for failures raised by a storage backend rather than by the
    /// request itself or the control service.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::FileIO(..) | Self::Csv(_) | Self::JsonEncoding(_)
        )
    }
}
