// Instance pooling
//
// Provides:
// - Named pools of reusable instances backed by one asset each
// - FIFO reuse with capacity/expansion policy
// - Registry-owned instance arena (callers only ever hold keys)

pub mod pool;
pub mod registry;

pub use pool::{Pool, PoolConfig};
pub use registry::{PendingDespawn, PoolRegistry};

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Opaque handle to a live pooled instance
    pub struct InstanceKey;
}

/// One created instance: provider handle plus lifecycle bookkeeping.
///
/// Whether the slot is issued or parked is owned by its pool's
/// available/active accounting, not duplicated here.
#[derive(Clone, Copy, Debug)]
pub(crate) struct InstanceSlot {
    pub native: crate::provider::NativeHandle,
    /// Bumped on every spawn; deferred despawns capture it to detect a
    /// recycled slot.
    pub generation: u32,
}

/// Arena holding every pooled instance across all pools
pub(crate) type InstanceArena = SlotMap<InstanceKey, InstanceSlot>;

/// Introspection snapshot of one pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolInfo {
    pub active: u32,
    pub available: u32,
    pub total: u32,
}
