//! Error types for file operations and the server-rejection taxonomy.

use canopy_core::{ApiError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// The file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CrudOp {
    Rename,
    Delete,
    Create,
}

/// Why the server refused an operation, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Protected,
    PathEscape,
    NotFound,
    NameCollision,
    DiskFull,
    NotEmpty,
    Busy,
    PermissionDenied,
    /// A 500 without a recognisable cause.
    ServerFailure(CrudOp),
    /// Anything else: the server's own text.
    Other(String),
}

const DISK_FULL: &[&str] = &["enospc", "no space left", "disk full", "disk quota"];
const NOT_EMPTY: &[&str] = &["enotempty", "not empty"];
const BUSY: &[&str] = &["ebusy", "resource busy", "in use"];
const PERMISSION: &[&str] = &["eacces", "eperm", "permission denied", "operation not permitted"];

fn mentions(message: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| message.contains(needle))
}

impl Rejection {
    /// Map a status code and the server's error text onto a rejection.
    ///
    /// Status-specific cases win; a 500 is first checked for a known
    /// system error before falling back to the generic failure.
    pub fn classify(op: CrudOp, err: &ApiError) -> Self {
        let raw = err.message();
        let message = raw.to_lowercase();
        match err.status_code() {
            Some(403) if message.contains("sensitive") => return Self::Protected,
            Some(403) if message.contains("traversal") => return Self::PathEscape,
            Some(404) => return Self::NotFound,
            Some(409) => return Self::NameCollision,
            _ => {}
        }

        if mentions(&message, DISK_FULL) {
            Self::DiskFull
        } else if mentions(&message, NOT_EMPTY) {
            Self::NotEmpty
        } else if mentions(&message, BUSY) {
            Self::Busy
        } else if mentions(&message, PERMISSION) {
            Self::PermissionDenied
        } else if err.status_code() == Some(500) {
            Self::ServerFailure(op)
        } else {
            Self::Other(raw)
        }
    }

    /// User-facing text.
    pub fn message(&self) -> String {
        match self {
            Self::Protected => "This file is protected and cannot be changed".into(),
            Self::PathEscape => "That path is outside the project".into(),
            Self::NotFound => "The file or folder no longer exists".into(),
            Self::NameCollision => "A file or folder with that name already exists".into(),
            Self::DiskFull => "Not enough disk space on the server".into(),
            Self::NotEmpty => "The folder is not empty".into(),
            Self::Busy => "The file is in use by another process".into(),
            Self::PermissionDenied => "Permission denied".into(),
            Self::ServerFailure(op) => format!("Failed to {op}: server error"),
            Self::Other(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CrudError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{}", .reason.message())]
    Rejected {
        op: CrudOp,
        path: String,
        reason: Rejection,
        #[source]
        source: ApiError,
    },

    #[error("Project changed while {0} was in flight")]
    Superseded(CrudOp),
}

impl CrudError {
    pub(crate) fn rejected(op: CrudOp, path: &str, source: ApiError) -> Self {
        Self::Rejected {
            op,
            path: path.to_string(),
            reason: Rejection::classify(op, &source),
            source,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

pub type CrudResult<T> = Result<T, CrudError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(status: u16, message: &str) -> Rejection {
        Rejection::classify(CrudOp::Delete, &ApiError::status(status, message))
    }

    #[test]
    fn test_forbidden_variants() {
        assert_eq!(classify(403, "Access to sensitive file denied"), Rejection::Protected);
        assert_eq!(classify(403, "Path traversal detected"), Rejection::PathEscape);
        assert_eq!(
            classify(403, "EACCES: permission denied"),
            Rejection::PermissionDenied
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(classify(404, "File not found"), Rejection::NotFound);
        assert_eq!(classify(409, "exists"), Rejection::NameCollision);
        assert_eq!(
            classify(500, "Internal error"),
            Rejection::ServerFailure(CrudOp::Delete)
        );
        assert_eq!(
            classify(500, "Internal error").message(),
            "Failed to delete: server error"
        );
    }

    #[test]
    fn test_substring_hints() {
        assert_eq!(classify(500, "ENOSPC: no space left on device"), Rejection::DiskFull);
        assert_eq!(classify(500, "ENOTEMPTY: directory not empty"), Rejection::NotEmpty);
        assert_eq!(classify(400, "EBUSY: resource busy or locked"), Rejection::Busy);
    }

    #[test]
    fn test_raw_message_fallback() {
        assert_eq!(
            classify(400, "Invalid file name"),
            Rejection::Other("Invalid file name".into())
        );
        let err = Rejection::classify(CrudOp::Create, &ApiError::network("connection refused"));
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn test_error_display_uses_user_message() {
        let err = CrudError::rejected(CrudOp::Rename, "a.txt", ApiError::status(409, "exists"));
        assert_eq!(err.to_string(), "A file or folder with that name already exists");
        assert!(!err.is_validation());
    }
}
