/// Error types for the mocked translation backend
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    /// A submission id that the repository never handed out
    #[error("Unknown submission ID: {0}")]
    SubmissionNotFound(u64),
    /// A content handle that is unknown or was already consumed
    #[error("Unknown content handle: {0}")]
    ContentNotFound(String),
    /// Simulated outage of the translation backend
    #[error("Communication error: {0}")]
    Communication(String),
    /// Invalid settings, rejected when the settings are built
    #[error("Configuration error: {0}")]
    Config(String),
    /// Uploaded content could not be read
    #[error("IO error: {0}")]
    Io(String),
}

impl FacadeError {
    /// True for faults a caller is expected to retry on its own
    pub fn is_communication(&self) -> bool {
        matches!(self, FacadeError::Communication(_))
    }

    /// True for unknown submission ids or content handles
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FacadeError::SubmissionNotFound(_) | FacadeError::ContentNotFound(_)
        )
    }
}

/// Result type for facade operations
pub type FacadeResult<T> = Result<T, FacadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            FacadeError::SubmissionNotFound(42).to_string(),
            "Unknown submission ID: 42"
        );
        assert_eq!(
            FacadeError::Config("bad".to_string()).to_string(),
            "Configuration error: bad"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert!(FacadeError::Communication("down".to_string()).is_communication());
        assert!(!FacadeError::Communication("down".to_string()).is_not_found());
        assert!(FacadeError::ContentNotFound("x".to_string()).is_not_found());
        assert!(FacadeError::SubmissionNotFound(1).is_not_found());
        assert!(!FacadeError::Io("x".to_string()).is_communication());
    }
}
