//! File operations for canopy.
//!
//! Names are validated locally before anything is sent. Server rejections
//! are mapped to user-facing messages, and each successful operation
//! refreshes only the folder it touched.

mod crud;
mod error;
mod selection;
mod validate;

pub use crud::{Created, CrudOrchestrator, DeleteRelease, Renamed};
pub use error::{CrudError, CrudOp, CrudResult, Rejection};
pub use selection::Selection;
pub use validate::{FORBIDDEN_CHARS, RESERVED_NAMES, validate_name};
