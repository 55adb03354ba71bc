use crate::{error::DataError, frame::BarFrame};
use fnv::FnvHashMap;
use playbook_instrument::timeframe::TimeframeRole;
use smol_str::SmolStr;
use tracing::debug;

/// Immutable per-run bar store: one [`BarFrame`] per declared [`TimeframeRole`], plus a
/// `ts_close -> idx` map per slower role for O(1) close detection on execution closes.
///
/// The `ts_close -> idx` membership test is the single close-detection mechanism: a
/// slower role's index advances exactly when an execution close coincides with one of
/// its own closes, and carries forward otherwise.
#[derive(Debug, Clone)]
pub struct BarFeed {
    exec: BarFrame,
    med: Option<BarFrame>,
    high: Option<BarFrame>,
    med_close_idx: FnvHashMap<i64, usize>,
    high_close_idx: FnvHashMap<i64, usize>,
}

impl BarFeed {
    pub fn new(exec: BarFrame, med: Option<BarFrame>, high: Option<BarFrame>) -> Self {
        let med_close_idx = med
            .as_ref()
            .map(|frame| frame.close_index_pairs().collect())
            .unwrap_or_default();
        let high_close_idx = high
            .as_ref()
            .map(|frame| frame.close_index_pairs().collect())
            .unwrap_or_default();

        debug!(
            exec_bars = exec.len(),
            med_bars = med.as_ref().map(BarFrame::len),
            high_bars = high.as_ref().map(BarFrame::len),
            "constructed BarFeed"
        );

        Self {
            exec,
            med,
            high,
            med_close_idx,
            high_close_idx,
        }
    }

    pub fn exec(&self) -> &BarFrame {
        &self.exec
    }

    /// Frame for `role`, `None` when the Play does not declare it.
    pub fn frame(&self, role: TimeframeRole) -> Option<&BarFrame> {
        match role {
            TimeframeRole::Exec => Some(&self.exec),
            TimeframeRole::Med => self.med.as_ref(),
            TimeframeRole::High => self.high.as_ref(),
        }
    }

    pub fn has_role(&self, role: TimeframeRole) -> bool {
        self.frame(role).is_some()
    }

    /// Index of the most-recent closed bar on `role` as of `exec_ts_close`, given the
    /// previously carried index. O(1) map membership test.
    pub fn latest_closed_idx(
        &self,
        role: TimeframeRole,
        exec_ts_close: i64,
        carried: Option<usize>,
    ) -> Option<usize> {
        let map = match role {
            TimeframeRole::Exec => return None,
            TimeframeRole::Med => &self.med_close_idx,
            TimeframeRole::High => &self.high_close_idx,
        };
        map.get(&exec_ts_close).copied().or(carried)
    }

    /// Verify each declared role has enough bars to satisfy its warmup requirement.
    pub fn check_warmup(
        &self,
        role: TimeframeRole,
        required: usize,
    ) -> Result<(), DataError> {
        let Some(frame) = self.frame(role) else {
            return Ok(());
        };
        if frame.len() < required {
            return Err(DataError::WarmupUnsatisfiable {
                role: SmolStr::new(role.as_str()),
                required,
                available: frame.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::Bar;
    use playbook_instrument::timeframe::Timeframe;

    fn frame(timeframe: Timeframe, count: usize) -> BarFrame {
        let duration = timeframe.duration_ms();
        let bars = (0..count)
            .map(|i| {
                let ts_open = i as i64 * duration;
                Bar::new(ts_open, ts_open + duration, 1.0, 2.0, 0.5, 1.5, 1.0)
            })
            .collect();
        BarFrame::from_bars(timeframe, bars).unwrap()
    }

    #[test]
    fn test_latest_closed_idx_carries_forward() {
        let feed = BarFeed::new(
            frame(Timeframe::M15, 8),
            None,
            Some(frame(Timeframe::H1, 2)),
        );

        // 15m closes at 900k, 1.8M, 2.7M, 3.6M...; 1h closes at 3.6M, 7.2M
        assert_eq!(
            feed.latest_closed_idx(TimeframeRole::High, 900_000, None),
            None
        );
        assert_eq!(
            feed.latest_closed_idx(TimeframeRole::High, 3_600_000, None),
            Some(0)
        );
        assert_eq!(
            feed.latest_closed_idx(TimeframeRole::High, 4_500_000, Some(0)),
            Some(0)
        );
        assert_eq!(
            feed.latest_closed_idx(TimeframeRole::High, 7_200_000, Some(0)),
            Some(1)
        );
    }

    #[test]
    fn test_check_warmup() {
        let feed = BarFeed::new(frame(Timeframe::M15, 8), None, None);
        assert!(feed.check_warmup(TimeframeRole::Exec, 8).is_ok());
        assert!(matches!(
            feed.check_warmup(TimeframeRole::Exec, 9),
            Err(DataError::WarmupUnsatisfiable { .. })
        ));
        // undeclared role has nothing to satisfy
        assert!(feed.check_warmup(TimeframeRole::Med, 100).is_ok());
    }
}
