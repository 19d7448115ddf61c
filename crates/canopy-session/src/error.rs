use canopy_git::GitError;
use canopy_ops::CrudError;
use canopy_tree::TreeError;
use thiserror::Error;

/// Any failure surfaced by a [`crate::Workspace`] operation.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Crud(#[from] CrudError),

    #[error("Workspace is closed")]
    Closed,
}

impl SessionError {
    /// The project switched under the operation; its result was dropped.
    pub fn is_superseded(&self) -> bool {
        match self {
            Self::Tree(err) => err.is_superseded(),
            Self::Git(err) => err.is_superseded(),
            Self::Crud(err) => err.is_superseded(),
            Self::Closed => false,
        }
    }

    /// Rejected locally before any request; shown inline, not as a toast.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Crud(err) if err.is_validation())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
