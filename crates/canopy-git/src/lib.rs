//! Git working-tree state for canopy.
//!
//! # Overview
//!
//! - [`StatusReconciler`] polls status and publishes a [`StatusView`]
//!   (snapshot plus per-path classification) through a watch channel.
//! - [`StageOrchestrator`] stages, unstages and discards with per-verb
//!   in-flight tracking and a slide-to-confirm for discards.
//! - [`GitActions`] runs commit, fetch, push, pull and checkout with
//!   status polling paused.
//! - [`TimelineBuilder`] fetches the log and builds a [`Timeline`].

mod error;
mod remote;
mod stage;
mod status;
mod timeline;

pub use error::{GitError, GitOp, GitResult};
pub use remote::GitActions;
pub use stage::{
    Claim, DiscardRelease, DiscardTarget, InFlight, IndexOutcome, IndexVerb, StageOrchestrator,
    discard_all_candidates, rename_groups, stage_all_candidates, unstage_all_candidates,
    with_rename_pairs,
};
pub use status::{PauseGuard, PollOutcome, StatusReconciler, StatusView, classify};
pub use timeline::{Connector, Timeline, TimelineBuilder, TimelineItem};
