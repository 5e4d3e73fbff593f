//! Engine configuration.

use crate::patch::DEFAULT_EDIT_BUDGET;
use crate::policy::CheckpointPolicy;

/// Default number of revisions kept per document.
pub const DEFAULT_MAX_REVISIONS: usize = 50;

/// Configuration shared by the commit, restore and retention paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// When a save becomes a revision
    pub policy: CheckpointPolicy,
    /// Revisions kept per document, head included (clamped to at least 1)
    pub max_revisions: usize,
    /// Insert/delete steps the differ explores before replacing the middle
    pub diff_edit_budget: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            policy: CheckpointPolicy::default(),
            max_revisions: DEFAULT_MAX_REVISIONS,
            diff_edit_budget: DEFAULT_EDIT_BUDGET,
        }
    }
}

impl HistoryConfig {
    /// Config for testing: every save checkpoints, small retention window.
    pub fn for_testing() -> Self {
        Self {
            policy: CheckpointPolicy::always(),
            max_revisions: 10,
            diff_edit_budget: DEFAULT_EDIT_BUDGET,
        }
    }

    pub fn with_max_revisions(mut self, max_revisions: usize) -> Self {
        self.max_revisions = max_revisions;
        self
    }

    pub fn with_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.policy = policy;
        self
    }
}
