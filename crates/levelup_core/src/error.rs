//! Error types for the progression engine.

use thiserror::Error;

/// Failure reported by a storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ProgressionError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(String),
}

impl ProgressionError {
    /// Short machine-readable code for host display.
    pub fn code(&self) -> &'static str {
        match self {
            ProgressionError::InvalidEvent(_) => "invalid_event",
            ProgressionError::Store(_) => "store",
            ProgressionError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ProgressionError = StoreError::from(io).into();
        assert_eq!(err.code(), "store");
        assert!(err.to_string().contains("gone"));
    }
}
