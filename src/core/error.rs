//! Error handling for repository publishing
//!
//! This module provides the error taxonomy for the publish workflow with
//! recovery guidance, using the thiserror crate for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, PublishError>;

/// Main error type for publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("Invalid configuration: {field} {message}")]
    InvalidConfiguration { field: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Artifact errors
    #[error("Failed to read artifact {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Remote action errors
    #[error("[{action}] {method} {url} failed{}: {message}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    ActionFailed {
        action: String,
        method: String,
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("[{action}] Unexpected response: {message}")]
    InvalidResponse { action: String, message: String },

    // Retry errors
    #[error("Retry exhausted: {description} after {attempts} times with result: {last_result}")]
    RetryExhausted {
        description: String,
        attempts: u32,
        last_result: String,
    },

    #[error("Retry timer exhausted: {description} ran out of intervals after {attempts} attempts")]
    RetryTimerExhausted { description: String, attempts: u32 },
}

impl PublishError {
    /// Shorthand for an [`PublishError::InvalidConfiguration`] on an empty field
    pub fn empty_field(field: &str) -> Self {
        Self::InvalidConfiguration {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        }
    }

    /// Workflow phase the error belongs to, if it came from a remote action
    pub fn phase(&self) -> Option<&str> {
        match self {
            Self::ActionFailed { action, .. } | Self::InvalidResponse { action, .. } => {
                Some(action)
            }
            Self::RetryExhausted { .. } | Self::RetryTimerExhausted { .. } => Some("poll"),
            Self::InvalidConfiguration { .. } | Self::ConfigError(_) | Self::FileRead { .. } => {
                None
            }
        }
    }

    /// Check if running the whole publish again may succeed
    ///
    /// Configuration problems and internal faults need a fix first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ActionFailed { status, .. } => match status {
                None => true,
                Some(code) => *code >= 500 || *code == 408 || *code == 429,
            },
            Self::RetryExhausted { .. } => true,
            Self::InvalidConfiguration { .. }
            | Self::ConfigError(_)
            | Self::FileRead { .. }
            | Self::InvalidResponse { .. }
            | Self::RetryTimerExhausted { .. } => false,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidConfiguration { .. } => vec![
                "Check the command-line flags and REPO_PUBLISH_* environment variables",
                "Check the configuration file",
            ],
            Self::ConfigError(_) => vec![
                "Check that the configuration file exists and is valid YAML",
                "Define every ${VAR} referenced by the configuration file",
            ],
            Self::FileRead { .. } => vec![
                "Check that the artifact was built",
                "Check the artifact path and its permissions",
            ],
            Self::ActionFailed {
                status: Some(401 | 403),
                ..
            } => vec![
                "Check the username and password",
                "Check that the user may publish to the repository",
            ],
            Self::ActionFailed { status: None, .. } => vec![
                "Check network connectivity to the repository server",
                "Use --insecure only if the server has a self-signed certificate",
            ],
            Self::ActionFailed { .. } => vec![
                "Check the response body in the error message",
                "Check the repository id and package metadata",
            ],
            Self::InvalidResponse { .. } => {
                vec!["Check that the server speaks the expected repository API version"]
            }
            Self::RetryExhausted { .. } => vec![
                "Check the processing job on the repository server",
                "Increase --max-attempts or --initial-delay-secs",
            ],
            Self::RetryTimerExhausted { .. } => {
                vec!["Provide a backoff schedule with at least as many intervals as attempts"]
            }
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::FileRead { .. } => "FILE_READ",
            Self::ActionFailed { .. } => "ACTION_FAILED",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            Self::RetryTimerExhausted { .. } => "RETRY_TIMER_EXHAUSTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_field_error() {
        let error = PublishError::empty_field("server");

        assert_eq!(error.code(), "INVALID_CONFIGURATION");
        assert!(!error.is_retryable());
        assert!(error.phase().is_none());
        assert_eq!(error.to_string(), "Invalid configuration: server must not be empty");
    }

    #[test]
    fn test_action_failed_with_status() {
        let error = PublishError::ActionFailed {
            action: "register".to_string(),
            method: "POST".to_string(),
            url: "https://repo.example.com/v1/packages".to_string(),
            status: Some(409),
            message: "version exists".to_string(),
        };

        assert_eq!(error.phase(), Some("register"));
        assert!(!error.is_retryable());
        let msg = error.to_string();
        assert!(msg.contains("POST https://repo.example.com/v1/packages"));
        assert!(msg.contains("with status 409"));
        assert!(msg.contains("version exists"));
    }

    #[test]
    fn test_action_failed_without_status_is_retryable() {
        let error = PublishError::ActionFailed {
            action: "upload".to_string(),
            method: "POST".to_string(),
            url: "https://repo.example.com/v1/files".to_string(),
            status: None,
            message: "connection refused".to_string(),
        };

        assert!(error.is_retryable());
        assert!(!error.to_string().contains("with status"));
        assert!(
            error
                .suggested_actions()
                .iter()
                .any(|a| a.contains("network"))
        );
    }

    #[test]
    fn test_auth_failure_suggestions() {
        let error = PublishError::ActionFailed {
            action: "upload".to_string(),
            method: "POST".to_string(),
            url: "https://repo.example.com/v1/files".to_string(),
            status: Some(401),
            message: String::new(),
        };

        assert!(
            error
                .suggested_actions()
                .iter()
                .any(|a| a.contains("password"))
        );
    }

    #[test]
    fn test_retry_exhausted_message() {
        let error = PublishError::RetryExhausted {
            description: "testing retry".to_string(),
            attempts: 5,
            last_result: "fail".to_string(),
        };

        assert_eq!(error.code(), "RETRY_EXHAUSTED");
        assert_eq!(error.phase(), Some("poll"));
        assert!(
            error
                .to_string()
                .contains("testing retry after 5 times with result: fail")
        );
    }

    #[test]
    fn test_retry_timer_exhausted_is_not_retryable() {
        let error = PublishError::RetryTimerExhausted {
            description: "poll".to_string(),
            attempts: 2,
        };

        assert!(!error.is_retryable());
        assert_eq!(error.code(), "RETRY_TIMER_EXHAUSTED");
    }

    #[test]
    fn test_file_read_display() {
        let error = PublishError::FileRead {
            path: PathBuf::from("/tmp/missing.deb"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };

        let display = format!("{}", error);
        assert!(display.contains("/tmp/missing.deb"));
        assert!(display.contains("not found"));
    }
}
