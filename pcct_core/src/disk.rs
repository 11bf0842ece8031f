//! Boundary to the disk-backed content store.
//!
//! The table never performs block I/O. When an entry whose payload lives on
//! disk is erased, the table tells the store which slot is free again; the
//! store reclaims it on its own schedule.

use crate::types::DiskSlot;

pub trait DiskStore: Send + Sync {
    /// Marks `slot` reusable. Must return without waiting on I/O.
    fn release(&self, slot: DiskSlot);
}

impl<F> DiskStore for F
where
    F: Fn(DiskSlot) + Send + Sync,
{
    fn release(&self, slot: DiskSlot) {
        self(slot)
    }
}
