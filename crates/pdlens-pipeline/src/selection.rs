//! Selection and follow mode
//!
//! Tracks which protocol log entry is in view. In auto-follow mode the
//! selection tracks the newest entry; in pinned mode it stays where the user
//! put it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::log::ProtocolLog;

/// How the selection reacts to new log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FollowMode {
    /// Selection moves to every newly appended entry
    #[default]
    AutoFollow,
    /// Selection stays on a user-chosen entry
    Pinned,
}

impl FollowMode {
    /// Whether the selection tracks the newest entry
    pub fn is_following(&self) -> bool {
        matches!(self, FollowMode::AutoFollow)
    }
}

/// Selection state machine
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    mode: FollowMode,
    selected: Option<u64>,
}

impl SelectionController {
    /// Create a controller in auto-follow mode with nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode
    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    /// Currently selected entry id, without checking it still exists
    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    /// React to entries being appended, `latest_id` being the newest
    ///
    /// Returns `true` when the selection changed.
    pub fn on_append(&mut self, latest_id: u64) -> bool {
        let next = match self.mode {
            FollowMode::AutoFollow => Some(latest_id),
            FollowMode::Pinned => self.selected.or(Some(latest_id)),
        };
        self.set(next)
    }

    /// Select an entry explicitly; switches to pinned mode
    pub fn select(&mut self, id: u64) -> bool {
        self.mode = FollowMode::Pinned;
        self.set(Some(id))
    }

    /// Flip between auto-follow and pinned
    ///
    /// Turning auto-follow on jumps to `latest_id` when there is one.
    pub fn toggle_follow(&mut self, latest_id: Option<u64>) -> FollowMode {
        self.mode = match self.mode {
            FollowMode::AutoFollow => FollowMode::Pinned,
            FollowMode::Pinned => FollowMode::AutoFollow,
        };
        if self.mode.is_following() && latest_id.is_some() {
            self.set(latest_id);
        }
        debug!("Follow mode now {:?}", self.mode);
        self.mode
    }

    /// The log was cleared; nothing is selected any more
    pub fn on_clear(&mut self) {
        self.selected = None;
    }

    /// Effective selection against the log
    ///
    /// The selected id when it still exists, else the newest entry, else none.
    pub fn resolve(&self, log: &ProtocolLog) -> Option<u64> {
        self.selected
            .filter(|id| log.contains(*id))
            .or_else(|| log.latest().map(|e| e.id))
    }

    fn set(&mut self, next: Option<u64>) -> bool {
        if self.selected == next {
            return false;
        }
        self.selected = next;
        true
    }
}
