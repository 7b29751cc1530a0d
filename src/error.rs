use std::fmt;

use serde::Serialize;

/// Structured error type for the application. Replaces stringly-typed errors
/// so callers can match on the failure class and pick the right recovery:
/// correct input, confirm an overwrite, retry, or give up.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Local, pre-network failure (empty name, unparsable JSON blob, ...).
    /// Never retried; the user must correct the input.
    Validation { message: String },
    /// Server reports the target name already exists. Resolved by an
    /// explicit user confirmation to overwrite, or by cancelling.
    Conflict { message: String },
    /// Server reachable but returned a non-2xx/non-409 status. The server
    /// message is surfaced verbatim; no automatic retry.
    Service { status: u16, message: String },
    /// The bounded wait elapsed before the server answered.
    Timeout { operation: String },
    /// Transport-level failure (connection refused, DNS, ...).
    Network { message: String },
    /// A server response did not match the expected shape. The palette
    /// cache is cleared defensively; retrying does not help.
    MalformedData { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
        }
    }

    /// Network-class failures get an explicit confirm-to-retry prompt;
    /// everything else is terminal for the attempt.
    pub fn is_network_class(&self) -> bool {
        matches!(self, AppError::Timeout { .. } | AppError::Network { .. })
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation { message } => write!(f, "{message}"),
            AppError::Conflict { message } => write!(f, "Conflict: {message}"),
            AppError::Service { status, message } => {
                write!(f, "Server error ({status}): {message}")
            }
            AppError::Timeout { operation } => write!(f, "Timed out waiting for {operation}"),
            AppError::Network { message } => write!(f, "Network error: {message}"),
            AppError::MalformedData { message } => {
                write!(f, "Unexpected response shape: {message}")
            }
        }
    }
}

impl std::error::Error for AppError {}

/// Errors serialize as their display string, for logs and JSON output.
impl Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout {
                operation: e
                    .url()
                    .map_or_else(|| "the palette service".to_string(), ToString::to_string),
            }
        } else if e.is_decode() {
            AppError::MalformedData {
                message: e.to_string(),
            }
        } else {
            AppError::Network {
                message: e.to_string(),
            }
        }
    }
}
