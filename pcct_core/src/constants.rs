//! Constants and configuration defaults for the PIT-CS composite table

/// Significant bits of a token; the rest belong to the caller.
pub const TOKEN_BITS: u32 = 48;
pub const TOKEN_MASK: u64 = (1 << TOKEN_BITS) - 1;
/// Upper bits left over for caller-defined metadata.
pub const TOKEN_META_SHIFT: u32 = TOKEN_BITS;
pub const TOKEN_META_MASK: u64 = !TOKEN_MASK;

/// Longest accepted table identifier, in bytes.
pub const ID_MAX_LEN: usize = 24;

/// 2^16 - 1 entries, sized for hash bucket occupancy.
pub const DEFAULT_CAPACITY: u32 = (1 << 16) - 1;

/// Entry handle layout: slot index in the low bits, then the slot
/// generation, then the tag of the table that issued the handle.
pub const SLOT_INDEX_BITS: u32 = 24;
pub const SLOT_INDEX_MASK: u64 = (1 << SLOT_INDEX_BITS) - 1;
pub const SLOT_GEN_BITS: u32 = 24;
pub const SLOT_GEN_MASK: u64 = (1 << SLOT_GEN_BITS) - 1;
pub const TABLE_TAG_SHIFT: u32 = SLOT_INDEX_BITS + SLOT_GEN_BITS;

/// Largest pool the slot index can address.
pub const MAX_CAPACITY: u32 = SLOT_INDEX_MASK as u32;

pub const DEFAULT_CS_DIRECT_CAPACITY: u32 = 1 << 14;
pub const DEFAULT_CS_INDIRECT_CAPACITY: u32 = 1 << 14;

pub const FNV_OFFSET: u64 = 0xcbf29ce484222325;
pub const FNV_PRIME: u64 = 0x100000001b3;
