use playbook_data::{cursor::MtfCursor, feed::BarFeed, structure::StructureSet};
use playbook_strategy::view::{MarketView, PathRef};

/// Ephemeral, zero-copy view of the market at one closed execution bar.
///
/// Construction is O(1): a bundle of references, the cursor's index triple, and the
/// exchange-supplied canonical mark. Resolution of any [`PathRef`] is a namespace
/// dispatch plus array indexing; MISSING values (pre-warmup indicators, offsets
/// beyond history, unformed structure fields) come back as `None`.
///
/// The snapshot never recomputes the mark; every consumer downstream of the
/// exchange sees the same value.
#[derive(Debug)]
pub struct Snapshot<'a> {
    feed: &'a BarFeed,
    structures: &'a StructureSet,
    cursor: MtfCursor,
    mark: f64,
    price_last: f64,
}

impl<'a> Snapshot<'a> {
    pub fn new(
        feed: &'a BarFeed,
        structures: &'a StructureSet,
        cursor: MtfCursor,
        mark: f64,
        price_last: f64,
    ) -> Self {
        Self {
            feed,
            structures,
            cursor,
            mark,
            price_last,
        }
    }

    pub fn mark(&self) -> f64 {
        self.mark
    }
}

impl MarketView for Snapshot<'_> {
    fn resolve(&self, path: &PathRef) -> Option<f64> {
        match *path {
            PathRef::Bar {
                role,
                field,
                offset,
            } => {
                let idx = self.cursor.idx(role)?.checked_sub(offset)?;
                let frame = self.feed.frame(role).expect("role resolved at compile");
                Some(frame.field(field, idx))
            }
            PathRef::Indicator { role, slot, offset } => {
                let idx = self.cursor.idx(role)?.checked_sub(offset)?;
                let frame = self.feed.frame(role).expect("role resolved at compile");
                frame.indicator(slot, idx)
            }
            PathRef::Structure {
                block_slot,
                field_slot,
            } => self.structures.value(block_slot, field_slot),
            PathRef::Rolling {
                role,
                window,
                is_high,
            } => {
                let idx = self.cursor.idx(role)?;
                let frame = self.feed.frame(role).expect("role resolved at compile");
                if is_high {
                    frame.rolling_high(window, idx)
                } else {
                    frame.rolling_low(window, idx)
                }
            }
            PathRef::PriceClose => Some(self.feed.exec().field(
                playbook_data::bar::BarField::Close,
                self.cursor.exec_idx,
            )),
            PathRef::PriceLast => Some(self.price_last),
            PathRef::MarkClose => Some(self.mark),
            PathRef::MarkHigh => Some(
                self.feed
                    .exec()
                    .field(playbook_data::bar::BarField::High, self.cursor.exec_idx),
            ),
            PathRef::MarkLow => Some(
                self.feed
                    .exec()
                    .field(playbook_data::bar::BarField::Low, self.cursor.exec_idx),
            ),
        }
    }

    fn ts_close(&self) -> i64 {
        self.feed.exec().ts_close(self.cursor.exec_idx)
    }
}
