use std::time::Duration;

use crate::form::FormField;

/// Failures obtaining or presenting a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No authenticated session is available to issue a token.
    #[error("No authenticated session")]
    SessionMissing,

    /// The service refused the presented token (HTTP 401/403).
    #[error("Token rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Transport-level failures. A timeout is reported the same way as any
/// other failed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// A client-side form check that failed before any request was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: FormField,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: FormField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every error the explorer surfaces to its caller.
///
/// Cloneable so one failure can be held in a settled query result and
/// handed to every caller that shared a collapsed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl ClientError {
    /// Field that failed validation, if this is a validation error.
    pub fn invalid_field(&self) -> Option<FormField> {
        match self {
            Self::Validation(err) => Some(err.field),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
