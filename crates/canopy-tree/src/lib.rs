//! Lazily loaded directory tree for canopy.
//!
//! # Overview
//!
//! - [`DirectoryCache`] holds listings per folder, the expanded set and the
//!   loading/preloading markers.
//! - [`TreeLoader`] fetches listings on demand (root, expand, preload,
//!   scoped refresh), de-duplicating concurrent requests per path.
//! - [`HoverPrefetcher`] preloads a folder after a hover dwell.
//! - [`ChangeDetector`] compares fingerprints of everything visible and
//!   publishes a [`ChangeSet`] until the user applies an update.

mod cache;
mod detector;
mod error;
mod loader;
mod prefetch;

pub use cache::{DirectoryCache, Listing, VisibleRow};
pub use detector::{ChangeDetector, ChangeSet, TickOutcome, UpdateOutcome, diff_listings};
pub use error::{TreeError, TreeResult};
pub use loader::{Toggle, TreeLoader};
pub use prefetch::HoverPrefetcher;
