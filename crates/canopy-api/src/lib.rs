//! Project server contract for canopy.
//!
//! [`ProjectApi`] is the seam every canopy component talks through.
//! [`HttpApi`] implements it against a real server; with the `test-util`
//! feature, [`FakeApi`] implements it in memory.

mod contract;
mod http;
mod wire;

#[cfg(any(test, feature = "test-util"))]
mod fake;

pub use contract::ProjectApi;
pub use http::HttpApi;

#[cfg(any(test, feature = "test-util"))]
pub use fake::{FakeApi, FakeCall};
