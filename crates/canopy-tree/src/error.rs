//! Error types for tree loading and change detection.

use canopy_core::ApiError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TreeError {
    #[error("Failed to load '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Project changed while '{path}' was loading")]
    Superseded { path: String },
}

impl TreeError {
    pub(crate) fn load(path: &str, source: ApiError) -> Self {
        Self::Load {
            path: display_path(path).to_string(),
            source,
        }
    }

    pub(crate) fn superseded(path: &str) -> Self {
        Self::Superseded {
            path: display_path(path).to_string(),
        }
    }

    /// The underlying API error, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Load { source, .. } => Some(source),
            Self::Api(err) => Some(err),
            Self::Superseded { .. } => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

pub type TreeResult<T> = Result<T, TreeError>;
