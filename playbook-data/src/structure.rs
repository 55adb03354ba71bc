use crate::{bar::Bar, error::DataError};
use indexmap::IndexMap;
use itertools::Itertools;
use playbook_instrument::timeframe::TimeframeRole;
use smol_str::SmolStr;

/// Collaborator contract for an incrementally-updated market-structure detector
/// (swings, zones, trends, ...).
///
/// Implementations must be O(1) per update. Fields are exposed through stable slots
/// resolved once at load time; a field's value is `None` while MISSING. `version`
/// increments on every output change, enabling downstream invalidation.
pub trait StructureDetector: std::fmt::Debug {
    /// Ingest a newly-closed bar on the detector's bound timeframe. O(1).
    fn update(&mut self, bar: &Bar);

    /// Declared output field names, in stable order. Slot `i` addresses name `i`.
    fn field_names(&self) -> &[SmolStr];

    /// Current value of the field at `slot`, `None` when MISSING.
    fn field(&self, slot: usize) -> Option<f64>;

    /// Monotonic output version; increments on every output change.
    fn version(&self) -> u64;
}

#[derive(Debug)]
struct Block {
    role: TimeframeRole,
    detector: Box<dyn StructureDetector>,
}

/// Registry of structure detectors keyed by block id (eg/ "swing_main").
///
/// Detectors themselves are external collaborators; the registry owns dispatch:
/// resolving `structure.<block_id>.<field>` paths to `(block_slot, field_slot)` pairs
/// at load, routing newly-closed bars to the right detectors, and O(1) slot reads.
#[derive(Debug, Default)]
pub struct StructureSet {
    blocks: IndexMap<SmolStr, Block>,
}

impl StructureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detector under `block_id`, bound to the bars of `role`.
    pub fn register<Id>(
        &mut self,
        block_id: Id,
        role: TimeframeRole,
        detector: Box<dyn StructureDetector>,
    ) where
        Id: Into<SmolStr>,
    {
        self.blocks
            .insert(block_id.into(), Block { role, detector });
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Resolve a `structure.<block>.<field>` reference to `(block_slot, field_slot)`.
    /// Unknown ids fail naming the available alternatives.
    pub fn resolve(&self, block_id: &str, field: &str) -> Result<(usize, usize), DataError> {
        let Some((block_slot, _, block)) = self.blocks.get_full(block_id) else {
            return Err(DataError::UnknownStructureBlock {
                block: SmolStr::new(block_id),
                available: SmolStr::new(self.blocks.keys().join(", ")),
            });
        };

        let names = block.detector.field_names();
        let Some(field_slot) = names.iter().position(|name| name == field) else {
            return Err(DataError::UnknownStructureField {
                block: SmolStr::new(block_id),
                field: SmolStr::new(field),
                available: SmolStr::new(names.iter().join(", ")),
            });
        };

        Ok((block_slot, field_slot))
    }

    /// Route a newly-closed bar on `role` to every detector bound to that role. O(1)
    /// per detector.
    pub fn update_closed(&mut self, role: TimeframeRole, bar: &Bar) {
        for block in self.blocks.values_mut() {
            if block.role == role {
                block.detector.update(bar);
            }
        }
    }

    /// Read the resolved `(block_slot, field_slot)` value. O(1).
    pub fn value(&self, block_slot: usize, field_slot: usize) -> Option<f64> {
        self.blocks[block_slot].detector.field(field_slot)
    }
}
