use crate::{bar::Bar, error::DataError};
use fnv::FnvHashMap;
use playbook_instrument::timeframe::Timeframe;

/// Contiguous 1-minute sub-bar stream covering the whole run window.
///
/// Backs the intra-bar fill subloop: for each execution bar the exchange iterates the
/// 1-minute bars inside `[ts_open, ts_close)`. Coverage is proven once by
/// [`MinuteStream::preflight`]; after that, window slicing is infallible.
#[derive(Debug, Clone)]
pub struct MinuteStream {
    bars: Vec<Bar>,
    ts_open_to_idx: FnvHashMap<i64, usize>,
}

impl MinuteStream {
    pub fn new(bars: Vec<Bar>) -> Result<Self, DataError> {
        for bar in &bars {
            bar.validate(Timeframe::M1)?;
        }
        let ts_open_to_idx = bars
            .iter()
            .enumerate()
            .map(|(idx, bar)| (bar.ts_open, idx))
            .collect();
        Ok(Self {
            bars,
            ts_open_to_idx,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Preflight: the stream must contiguously cover `[start_ts, end_ts)`.
    pub fn preflight(&self, start_ts: i64, end_ts: i64) -> Result<(), DataError> {
        let minute = Timeframe::M1.duration_ms();
        let mut ts = start_ts;
        while ts < end_ts {
            let Some(&idx) = self.ts_open_to_idx.get(&ts) else {
                return Err(DataError::MinuteGap {
                    ts_open: ts,
                    ts_close: ts + minute,
                });
            };
            // Map entries must point at a contiguous ascending run
            if idx + 1 < self.bars.len() && self.bars[idx + 1].ts_open != ts + minute {
                return Err(DataError::MinuteGap {
                    ts_open: ts + minute,
                    ts_close: ts + 2 * minute,
                });
            }
            ts += minute;
        }
        Ok(())
    }

    /// The 1-minute sub-bars inside `[ts_open, ts_close)`.
    ///
    /// Coverage is a preflight-checked precondition; a hole here is a programming error.
    pub fn window(&self, ts_open: i64, ts_close: i64) -> &[Bar] {
        let count = ((ts_close - ts_open) / Timeframe::M1.duration_ms()) as usize;
        let start = *self
            .ts_open_to_idx
            .get(&ts_open)
            .unwrap_or_else(|| panic!("1m stream hole at ts_open={ts_open}: preflight missed"));
        &self.bars[start..start + count]
    }
}
