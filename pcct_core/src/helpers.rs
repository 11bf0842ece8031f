//! Helper functions for hashing names and packing entry handles

use crate::constants::{FNV_OFFSET, FNV_PRIME, SLOT_GEN_MASK, SLOT_INDEX_BITS, SLOT_INDEX_MASK, TABLE_TAG_SHIFT};

#[inline]
fn fnv1a_update(mut h: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    fnv1a_update(FNV_OFFSET, bytes)
}

/// Digest of a name plus optional forwarding hint.
///
/// A hint-less name and the same name with an empty hint hash differently,
/// matching how the two keys compare.
pub fn name_digest(name: &[u8], fwd_hint: Option<&[u8]>) -> u64 {
    let h = fnv1a_update(FNV_OFFSET, name);
    match fwd_hint {
        None => h,
        Some(hint) => fnv1a_update(fnv1a_update(h, &[0xFF]), hint),
    }
}

// Packs table tag, generation and slot index into a single u64 for ABA-safe
// handles: | tag:16 | gen:24 | index:24 |.
#[inline]
pub fn pack(tag: u16, gen: u32, index: u32) -> u64 {
    ((tag as u64) << TABLE_TAG_SHIFT)
        | ((gen as u64 & SLOT_GEN_MASK) << SLOT_INDEX_BITS)
        | (index as u64 & SLOT_INDEX_MASK)
}

#[inline]
pub fn unpack(packed: u64) -> (u16, u32, u32) {
    (
        (packed >> TABLE_TAG_SHIFT) as u16,
        ((packed >> SLOT_INDEX_BITS) & SLOT_GEN_MASK) as u32,
        (packed & SLOT_INDEX_MASK) as u32,
    )
}

/// True for 2^q - 1, the sizes that fill hash buckets evenly.
#[inline]
pub fn is_pow2_minus_one(n: u32) -> bool {
    n != 0 && (n & n.wrapping_add(1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_roundtrip_keeps_fields() {
        let p = pack(0xBEEF, 7, 0xDEAD);
        assert_eq!(unpack(p), (0xBEEF, 7, 0xDEAD));
    }

    #[test]
    fn pack_keeps_fields_apart() {
        let full = pack(0, SLOT_GEN_MASK as u32, SLOT_INDEX_MASK as u32);
        assert_eq!(unpack(full), (0, SLOT_GEN_MASK as u32, SLOT_INDEX_MASK as u32));
        assert_ne!(pack(1, 0, 0), pack(2, 0, 0));
    }

    #[test]
    fn digest_separates_hint() {
        let plain = name_digest(b"/a/b", None);
        let hinted = name_digest(b"/a/b", Some(b""));
        assert_ne!(plain, hinted);
        assert_eq!(plain, fnv1a_64(b"/a/b"));
    }

    #[test]
    fn pow2_minus_one() {
        assert!(is_pow2_minus_one(1));
        assert!(is_pow2_minus_one(255));
        assert!(is_pow2_minus_one(u32::MAX));
        assert!(!is_pow2_minus_one(0));
        assert!(!is_pow2_minus_one(256));
        assert!(!is_pow2_minus_one(1000));
    }
}
