//! Autosave checkpoint policy.
//!
//! A save only becomes a revision when the writer has paused (idle threshold)
//! or has been typing long enough that a checkpoint is overdue (force
//! threshold). Continuous typing therefore produces at most one revision per
//! force window, and a pause always closes off the burst before it.

use std::time::Duration;

use crate::revision::Timestamp;

/// Default pause after which the next save is checkpointed.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Default upper bound between checkpoints during continuous editing.
pub const DEFAULT_FORCE_THRESHOLD: Duration = Duration::from_secs(15 * 60);

/// Thresholds consulted on every save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    pub idle_threshold: Duration,
    pub force_threshold: Duration,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            force_threshold: DEFAULT_FORCE_THRESHOLD,
        }
    }
}

impl CheckpointPolicy {
    /// Short thresholds for tests (1s idle / 3s force).
    pub fn for_testing() -> Self {
        Self {
            idle_threshold: Duration::from_secs(1),
            force_threshold: Duration::from_secs(3),
        }
    }

    /// Every save becomes a revision once the clock has moved past the
    /// previous edit.
    pub fn always() -> Self {
        Self {
            idle_threshold: Duration::ZERO,
            force_threshold: Duration::ZERO,
        }
    }

    pub fn should_checkpoint(
        &self,
        last_edited_at: Option<Timestamp>,
        last_checkpoint_at: Option<Timestamp>,
        now: Timestamp,
    ) -> bool {
        should_checkpoint(
            last_edited_at,
            last_checkpoint_at,
            now,
            self.idle_threshold,
            self.force_threshold,
        )
    }
}

/// Decide whether a save at `now` should be recorded as a revision.
///
/// True when the document was never checkpointed, when more than `idle` has
/// passed since the previous edit (if there was one), or when more than
/// `force` has passed since the last checkpoint. A clock that runs backwards
/// yields elapsed time 0.
pub fn should_checkpoint(
    last_edited_at: Option<Timestamp>,
    last_checkpoint_at: Option<Timestamp>,
    now: Timestamp,
    idle: Duration,
    force: Duration,
) -> bool {
    let Some(last_checkpoint_at) = last_checkpoint_at else {
        return true;
    };

    let idle_expired = last_edited_at
        .is_some_and(|edited| now.saturating_sub(edited) as u128 > idle.as_millis());
    let since_checkpoint = now.saturating_sub(last_checkpoint_at) as u128;

    idle_expired || since_checkpoint > force.as_millis()
}
