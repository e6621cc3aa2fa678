//! Error types for collection-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (remote host, task lifecycle, configuration)
//! - HTTP status code mapping for embedding request layers
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{TaskId, TaskStatus};

/// Result type alias for collection-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for collection-dl
///
/// Rejected requests (bad configuration, malformed URIs, operations in the wrong state)
/// surface through this type. Once a task exists, its failures are recorded on the task
/// itself and observed by polling.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "remote.host")
        key: Option<String>,
    },

    /// The remote file host answered with a non-success code
    #[error("remote host error (code {code}): {message}")]
    Remote {
        /// Code from the response envelope, or the HTTP status when no envelope was returned
        code: i64,
        /// Message reported by the remote host
        message: String,
    },

    /// Login check against the remote host failed
    #[error("remote host login failed: {0}")]
    LoginFailed(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Download URI was rejected before submission
    #[error("invalid download uri: {0}")]
    InvalidUri(String),

    /// Regular expression failed to compile
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Task lifecycle error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Name resolution failed for a file
    #[error("name resolution failed: {0}")]
    Resolver(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Task lifecycle errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task is unknown, expired, or already retired
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: TaskId,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: TaskId,
        /// The operation that was attempted (e.g., "organize", "cancel")
        operation: String,
        /// The state that prevents the operation
        current_state: TaskStatus,
    },
}

/// Error response body for request layers embedding the library
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_state",
///     "message": "task error: cannot organize task 3f2a... in state downloading",
///     "details": {
///       "task_id": "3f2a...",
///       "operation": "organize",
///       "current_state": "downloading"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "invalid_uri")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Pattern(_) => 400,

            // 422 Unprocessable Entity
            Error::InvalidUri(_) => 422,
            Error::Resolver(_) => 422,

            Error::Task(TaskError::NotFound { .. }) => 404,
            Error::Task(TaskError::InvalidState { .. }) => 409,

            // 502 Bad Gateway - the remote file host misbehaved
            Error::Remote { .. } => 502,
            Error::LoginFailed(_) => 502,
            Error::Network(_) => 502,

            Error::Serialization(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Remote { .. } => "remote_error",
            Error::LoginFailed(_) => "login_failed",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidUri(_) => "invalid_uri",
            Error::Pattern(_) => "invalid_pattern",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::InvalidState { .. } => "invalid_state",
            },
            Error::Resolver(_) => "resolver_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Remote { code, .. } => Some(serde_json::json!({
                "remote_code": code,
            })),
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "task_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn task_id() -> TaskId {
        TaskId::from("0123456789abcdef0123456789abcdef")
    }

    /// Returns (Error, expected_status_code, expected_error_code) for every
    /// reachable match arm in ToHttpStatus.
    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "host must not be empty".into(),
                    key: Some("remote.host".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::Pattern(regex::Regex::new("(unclosed").unwrap_err()),
                400,
                "invalid_pattern",
            ),
            (
                Error::InvalidUri("http://example.com/a.torrent".into()),
                422,
                "invalid_uri",
            ),
            (
                Error::Resolver("no episode".into()),
                422,
                "resolver_error",
            ),
            (
                Error::Task(TaskError::NotFound { id: task_id() }),
                404,
                "task_not_found",
            ),
            (
                Error::Task(TaskError::InvalidState {
                    id: task_id(),
                    operation: "organize".into(),
                    current_state: TaskStatus::Downloading,
                }),
                409,
                "invalid_state",
            ),
            (
                Error::Remote {
                    code: 500,
                    message: "object not found".into(),
                },
                502,
                "remote_error",
            ),
            (
                Error::LoginFailed("token rejected".into()),
                502,
                "login_failed",
            ),
            (
                Error::Serialization(serde_json::from_str::<u32>("x").unwrap_err()),
                500,
                "serialization_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            assert_eq!(
                error.status_code(),
                expected_status,
                "error_code={expected_code} returned the wrong status"
            );
            assert_eq!(error.error_code(), expected_code);
        }
    }

    #[test]
    fn invalid_state_message_names_operation_and_state() {
        let error = Error::Task(TaskError::InvalidState {
            id: task_id(),
            operation: "cancel".into(),
            current_state: TaskStatus::Organizing,
        });
        let message = error.to_string();
        assert!(message.contains("cancel"));
        assert!(message.contains("organizing"));
        assert!(message.contains("0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn api_error_carries_task_details() {
        let api: ApiError = Error::Task(TaskError::InvalidState {
            id: task_id(),
            operation: "organize".into(),
            current_state: TaskStatus::Downloading,
        })
        .into();

        assert_eq!(api.error.code, "invalid_state");
        let details = api.error.details.unwrap();
        assert_eq!(details["operation"], "organize");
        assert_eq!(details["current_state"], "downloading");
        assert_eq!(details["task_id"], "0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn api_error_without_context_omits_details() {
        let api: ApiError = Error::Other("boom".into()).into();
        let json = serde_json::to_value(&api).unwrap();
        assert!(json["error"].get("details").is_none());
        assert_eq!(json["error"]["message"], "boom");
    }
}
