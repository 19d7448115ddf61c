//! Session layer for canopy.
//!
//! A [`Workspace`] owns the project context and every component built on
//! it: the directory tree and its change detector, git status and index
//! orchestration, the commit timeline and file operations. It runs the
//! background pollers, turns mutating results into notifications and tears
//! everything down on project switch or close.

mod error;
mod poller;
mod workspace;

pub use error::{SessionError, SessionResult};
pub use poller::spawn_poller;
pub use workspace::Workspace;
