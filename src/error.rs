use thiserror::Error;

/// Unified error type for the Vigil application
#[derive(Error, Debug)]
pub enum VigilError {
    // Configuration errors
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Routing controller errors
    #[error("Routing update failed: {0}")]
    Routing(String),

    // State persistence errors
    #[error("State persistence failed: {0}")]
    StatePersist(String),

    // Notification errors
    #[error("Notification delivery failed: {0}")]
    Notify(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

impl VigilError {
    /// Configuration errors are the only fatal class; everything else is
    /// absorbed into the orchestration flow.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            VigilError::ConfigNotFound(_) | VigilError::InvalidConfig(_)
        )
    }
}

// Convert from reqwest errors
impl From<reqwest::Error> for VigilError {
    fn from(err: reqwest::Error) -> Self {
        VigilError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for VigilError {
    fn from(err: url::ParseError) -> Self {
        VigilError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        assert!(VigilError::ConfigNotFound("config.json".to_string()).is_config());
        assert!(VigilError::InvalidConfig("bad".to_string()).is_config());

        assert!(!VigilError::Routing("rpc failed".to_string()).is_config());
        assert!(!VigilError::Notify("telegram down".to_string()).is_config());
        assert!(!VigilError::StatePersist("disk full".to_string()).is_config());
    }

    #[test]
    fn test_error_display() {
        let err = VigilError::Routing("exit status 1".to_string());
        assert_eq!(err.to_string(), "Routing update failed: exit status 1");

        let err = VigilError::ConfigNotFound("missing.json".to_string());
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VigilError = io.into();
        assert!(matches!(err, VigilError::Io(_)));
        assert!(!err.is_config());
    }
}
