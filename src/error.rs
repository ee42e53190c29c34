use thiserror::Error;

/// Main error type for the discovery engine
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content source lookups (transport, not-found, malformed payloads)
    #[error("Content source error: {0}")]
    ContentSource(String),

    /// Seed value or seed kind rejected before a task is created
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// No task record with this id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Task exists but is in the wrong state for the requested operation
    #[error("Invalid task state: {0}")]
    InvalidState(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        DiscoveryError::ContentSource(err.to_string())
    }
}

/// Convenient Result type using DiscoveryError
pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiscoveryError::InvalidSeed("unsupported seed kind: podcast".to_string());
        assert!(err.to_string().contains("Invalid seed"));
        assert!(err.to_string().contains("podcast"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: DiscoveryError = rusqlite_err.into();
        assert!(matches!(err, DiscoveryError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DiscoveryError = io_err.into();
        assert!(matches!(err, DiscoveryError::Io(_)));
    }
}
