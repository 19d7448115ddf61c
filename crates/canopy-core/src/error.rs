//! Error types shared by every canopy crate.

use thiserror::Error;

/// Errors returned by the server contract.
///
/// `Clone` so that one pending request can hand the same failure to every
/// waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (DNS, connect, timeout).
    #[error("Network error: {message}")]
    Network { message: String },

    /// The response body could not be decoded.
    #[error("Malformed response: {message}")]
    Decode { message: String },

    /// The project was switched while the request was in flight.
    #[error("Project changed while the request was in flight")]
    Superseded,
}

impl ApiError {
    /// Create a status error.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// HTTP status code, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's `{error|message}` text, or the transport description.
    pub fn message(&self) -> String {
        match self {
            Self::Status { message, .. }
            | Self::Network { message }
            | Self::Decode { message } => message.clone(),
            Self::Superseded => self.to_string(),
        }
    }

    /// Whether this is a 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

/// Result alias for server calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// A name rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is too long (max 255 characters)")]
    TooLong,

    #[error("Name cannot contain path separators")]
    PathSeparator,

    #[error("Name cannot contain '{0}'")]
    ForbiddenChar(char),

    #[error("Name cannot contain control characters")]
    ControlChar,

    #[error("'{0}' is a reserved system name")]
    Reserved(String),

    #[error("'.' and '..' are reserved names")]
    DotName,

    #[error("Name cannot start or end with spaces")]
    SurroundingSpace,

    #[error("Name cannot end with a dot")]
    TrailingDot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_code() {
        let err = ApiError::status(409, "exists");
        assert_eq!(err.status_code(), Some(409));
        assert_eq!(err.message(), "exists");
        assert_eq!(ApiError::network("timeout").status_code(), None);
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(ApiError::status(404, "gone").to_string(), "HTTP 404: gone");
        assert!(ApiError::status(404, "gone").is_not_found());
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::ForbiddenChar('?').to_string(),
            "Name cannot contain '?'"
        );
    }
}
