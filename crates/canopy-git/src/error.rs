//! Error types for git operations.

use canopy_core::ApiError;
use serde::Serialize;
use thiserror::Error;

/// The git operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GitOp {
    Status,
    Stage,
    Unstage,
    Discard,
    Commit,
    Fetch,
    Push,
    Pull,
    Log,
    Branches,
    Checkout,
}

#[derive(Debug, Clone, Error)]
pub enum GitError {
    #[error("Git {op} failed: {source}")]
    Request {
        op: GitOp,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("'{0}' has merge conflicts and cannot be staged")]
    Conflicted(String),

    #[error("Commit message cannot be empty")]
    EmptyMessage,

    #[error("Nothing to push")]
    NothingToPush,

    #[error("Another remote operation is already running")]
    Busy,

    #[error("Project changed while git {0} was running")]
    Superseded(GitOp),
}

impl GitError {
    pub(crate) fn request(op: GitOp, source: ApiError) -> Self {
        Self::Request { op, source }
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Request { source, .. } => Some(source),
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

pub type GitResult<T> = Result<T, GitError>;
