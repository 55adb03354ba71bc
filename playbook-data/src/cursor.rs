use crate::feed::BarFeed;
use playbook_instrument::timeframe::TimeframeRole;
use serde::{Deserialize, Serialize};

/// Which roles closed a bar on the current execution step, in the deterministic
/// update order (high first, then medium, then exec).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct RoleCloses {
    pub high: bool,
    pub med: bool,
    pub exec: bool,
}

/// The multi-timeframe index triple `(exec_idx, med_idx, high_idx)` - index of the
/// most-recent *closed* bar per role.
///
/// Forward-fill invariant: `med_idx` / `high_idx` advance only when their own
/// `ts_close` coincides with the execution `ts_close`; otherwise they carry forward.
/// Coincident closes apply highest timeframe first, then medium, then exec.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct MtfCursor {
    pub exec_idx: usize,
    pub med_idx: Option<usize>,
    pub high_idx: Option<usize>,
    started: bool,
}

impl MtfCursor {
    pub fn new() -> Self {
        Self {
            exec_idx: 0,
            med_idx: None,
            high_idx: None,
            started: false,
        }
    }

    /// Advance to the next execution bar and forward-fill the slower roles.
    ///
    /// Returns which roles closed on this step. O(1).
    pub fn advance(&mut self, feed: &BarFeed) -> RoleCloses {
        if self.started {
            self.exec_idx += 1;
        } else {
            self.started = true;
        }

        let exec_ts_close = feed.exec().ts_close(self.exec_idx);
        let mut closes = RoleCloses::default();

        // Tie-break: highest timeframe first, then medium, then exec.
        for role in TimeframeRole::UPDATE_ORDER {
            match role {
                TimeframeRole::High => {
                    let next = feed.latest_closed_idx(role, exec_ts_close, self.high_idx);
                    closes.high = next != self.high_idx;
                    self.high_idx = next;
                }
                TimeframeRole::Med => {
                    let next = feed.latest_closed_idx(role, exec_ts_close, self.med_idx);
                    closes.med = next != self.med_idx;
                    self.med_idx = next;
                }
                TimeframeRole::Exec => {
                    closes.exec = true;
                }
            }
        }

        closes
    }

    /// Index of the most-recent closed bar for `role`, `None` when the role has not
    /// closed yet (or is undeclared).
    pub fn idx(&self, role: TimeframeRole) -> Option<usize> {
        match role {
            TimeframeRole::Exec => Some(self.exec_idx),
            TimeframeRole::Med => self.med_idx,
            TimeframeRole::High => self.high_idx,
        }
    }

    /// Readiness gate: every declared role has at least one closed bar AND its
    /// declared warmup bar count has elapsed.
    pub fn is_ready(&self, feed: &BarFeed, warmup: impl Fn(TimeframeRole) -> usize) -> bool {
        if self.exec_idx + 1 < warmup(TimeframeRole::Exec).max(1) {
            return false;
        }
        for role in [TimeframeRole::Med, TimeframeRole::High] {
            if !feed.has_role(role) {
                continue;
            }
            match self.idx(role) {
                None => return false,
                Some(idx) => {
                    if idx + 1 < warmup(role).max(1) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Default for MtfCursor {
    fn default() -> Self {
        Self::new()
    }
}
