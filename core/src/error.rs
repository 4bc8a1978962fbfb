use thiserror::Error;

/// Appstash error types
#[derive(Error, Debug)]
pub enum StashError {
    /// A manifest document could not be parsed
    #[error("Parse error: {path} - {message}")]
    ParseError { path: String, message: String },

    /// Registry unreachable or transport failure
    #[error("Network error: {registry} - {message}")]
    NetworkError { registry: String, message: String },

    /// Credentials rejected where they are required
    #[error("Authentication error: {registry} - {message}")]
    AuthError { registry: String, message: String },

    /// Nothing stored at the given reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pulled content has the wrong media type or fails to unpack
    #[error("Corrupt artifact: {reference} - {message}")]
    CorruptArtifact { reference: String, message: String },

    /// Malformed stored envelope or embedded document
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Archive build failure or rejected push
    #[error("Storage error: {reference} - {message}")]
    StorageError { reference: String, message: String },

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Image reference that cannot be parsed
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A sequence was written twice
    #[error("Version already exists: {app_id} sequence {sequence}")]
    VersionExists { app_id: String, sequence: i64 },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for StashError {
    fn from(err: serde_json::Error) -> Self {
        StashError::EncodingError(err.to_string())
    }
}

impl From<serde_yaml::Error> for StashError {
    fn from(err: serde_yaml::Error) -> Self {
        StashError::EncodingError(err.to_string())
    }
}

impl StashError {
    /// Whether the scanner may drop the offending input and keep going.
    ///
    /// Only document parse failures are recovered; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StashError::ParseError { .. })
    }
}

/// Result type alias for appstash operations
pub type Result<T> = std::result::Result<T, StashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = StashError::ParseError {
            path: "base/deployment.yaml".to_string(),
            message: "did not find expected key".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Parse error: base/deployment.yaml - did not find expected key"
        );
    }

    #[test]
    fn test_network_error_display() {
        let error = StashError::NetworkError {
            registry: "quay.io".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(error.to_string(), "Network error: quay.io - connection refused");
    }

    #[test]
    fn test_auth_error_display() {
        let error = StashError::AuthError {
            registry: "registry.example".to_string(),
            message: "invalid username/password".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Authentication error: registry.example - invalid username/password"
        );
    }

    #[test]
    fn test_not_found_display() {
        let error = StashError::NotFound("reg.example/base/app1:3".to_string());
        assert_eq!(error.to_string(), "Not found: reg.example/base/app1:3");
    }

    #[test]
    fn test_corrupt_artifact_display() {
        let error = StashError::CorruptArtifact {
            reference: "reg.example/base/app1:3".to_string(),
            message: "unexpected media type".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Corrupt artifact: reg.example/base/app1:3 - unexpected media type"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let error = StashError::StorageError {
            reference: "reg.example/base/app1:3".to_string(),
            message: "push rejected".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Storage error: reg.example/base/app1:3 - push rejected"
        );
    }

    #[test]
    fn test_version_exists_display() {
        let error = StashError::VersionExists {
            app_id: "app1".to_string(),
            sequence: 3,
        };
        assert_eq!(error.to_string(), "Version already exists: app1 sequence 3");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: StashError = io_error.into();
        assert!(matches!(error, StashError::IoError(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let error: StashError = result.unwrap_err().into();
        assert!(matches!(error, StashError::EncodingError(_)));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let error: StashError = result.unwrap_err().into();
        assert!(matches!(error, StashError::EncodingError(_)));
    }

    #[test]
    fn test_only_parse_errors_are_recoverable() {
        let parse = StashError::ParseError {
            path: "a.yaml".to_string(),
            message: "bad".to_string(),
        };
        assert!(parse.is_recoverable());
        assert!(!StashError::TimeoutError("probe".to_string()).is_recoverable());
        assert!(!StashError::NotFound("ref".to_string()).is_recoverable());
    }
}
