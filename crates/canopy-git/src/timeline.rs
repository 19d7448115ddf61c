//! Commit timeline with pushed/unpushed classification and the branch
//! divergence marker.

use std::sync::Arc;

use canopy_api::ProjectApi;
use canopy_core::{CommitRecord, LogResponse, ProjectContext};
use serde::Serialize;
use tracing::warn;

use crate::error::{GitError, GitOp, GitResult};

/// One rendered row of the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimelineItem {
    /// Where the current branch forked from `default_branch`.
    #[serde(rename_all = "camelCase")]
    Divergence { default_branch: Option<String> },
    Commit {
        #[serde(flatten)]
        commit: CommitRecord,
        /// Style of the line down to the next commit, if there is one.
        connector: Option<Connector>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    Pushed,
    Unpushed,
}

/// Newest-first commit list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    commits: Vec<CommitRecord>,
    unpushed_count: u32,
    merge_base_hash: Option<String>,
    default_branch: Option<String>,
    divergence_index: Option<usize>,
}

impl Timeline {
    pub fn new(log: LogResponse) -> Self {
        let mut commits = log.commits;
        for (i, commit) in commits.iter_mut().enumerate() {
            commit.is_head = i == 0;
        }

        let divergence_index = log.merge_base_hash.as_deref().and_then(|base| {
            commits
                .iter()
                .position(|c| c.hash == base)
                .filter(|&i| i > 0)
        });

        Self {
            commits,
            unpushed_count: log.unpushed_count,
            merge_base_hash: log.merge_base_hash,
            default_branch: log.default_branch,
            divergence_index,
        }
    }

    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn unpushed_count(&self) -> u32 {
        self.unpushed_count
    }

    pub fn merge_base_hash(&self) -> Option<&str> {
        self.merge_base_hash.as_deref()
    }

    pub fn default_branch(&self) -> Option<&str> {
        self.default_branch.as_deref()
    }

    /// Index of the commit the divergence marker sits above. Never 0.
    pub fn divergence_index(&self) -> Option<usize> {
        self.divergence_index
    }

    /// Style of the connector between commit `index` and `index + 1`.
    /// Unpushed only when both ends are unpushed.
    pub fn connector(&self, index: usize) -> Option<Connector> {
        let upper = self.commits.get(index)?;
        let lower = self.commits.get(index + 1)?;
        Some(if !upper.is_pushed && !lower.is_pushed {
            Connector::Unpushed
        } else {
            Connector::Pushed
        })
    }

    /// Index of the newest pushed commit, or `len()` when none is pushed.
    pub fn first_pushed_index(&self) -> usize {
        self.commits
            .iter()
            .position(|c| c.is_pushed)
            .unwrap_or(self.commits.len())
    }

    /// Whether `ahead` agrees with where the pushed commits begin. A log
    /// cut off before any pushed commit agrees with any `ahead` at least as
    /// large as the log.
    pub fn is_consistent_with(&self, ahead: u32) -> bool {
        let boundary = self.first_pushed_index();
        let ahead = ahead as usize;
        if boundary == self.commits.len() {
            ahead >= boundary
        } else {
            ahead == boundary
        }
    }

    /// Rows in render order, with the divergence marker in place.
    pub fn items(&self) -> Vec<TimelineItem> {
        let mut items = Vec::with_capacity(self.commits.len() + 1);
        for (i, commit) in self.commits.iter().enumerate() {
            if self.divergence_index == Some(i) {
                items.push(TimelineItem::Divergence {
                    default_branch: self.default_branch.clone(),
                });
            }
            items.push(TimelineItem::Commit {
                commit: commit.clone(),
                connector: self.connector(i),
            });
        }
        items
    }
}

/// Fetches the log and builds a [`Timeline`].
pub struct TimelineBuilder<A> {
    api: Arc<A>,
    project: Arc<ProjectContext>,
    limit: usize,
}

impl<A: ProjectApi> TimelineBuilder<A> {
    pub fn new(api: Arc<A>, project: Arc<ProjectContext>, limit: usize) -> Self {
        Self {
            api,
            project,
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn fetch_timeline(&self) -> GitResult<Timeline> {
        self.fetch_with_limit(self.limit).await
    }

    pub async fn fetch_with_limit(&self, limit: usize) -> GitResult<Timeline> {
        let scope = self.project.scope();
        let result = self.api.log(scope.name(), limit).await;
        if !scope.is_current() {
            return Err(GitError::Superseded(GitOp::Log));
        }

        let timeline = Timeline::new(result.map_err(|e| GitError::request(GitOp::Log, e))?);
        if !timeline.is_consistent_with(timeline.unpushed_count) {
            warn!(
                unpushed = timeline.unpushed_count,
                first_pushed = timeline.first_pushed_index(),
                "Unpushed count disagrees with pushed flags in log"
            );
        }
        Ok(timeline)
    }
}
