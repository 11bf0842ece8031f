//! Primary index: name digest to entry.
//!
//! Each digest maps to the head of a collision chain threaded through the
//! entries themselves (`PccEntry::chain`). Entries in one chain share the
//! digest and are told apart by `PccSearch::matches`.

use crate::pool::EntryPool;
use crate::types::{EntryId, PccSearch};
use std::collections::{HashMap, TryReserveError};
use std::hash::{BuildHasherDefault, Hasher};

/// Pass-through hasher; the keys are already digests.
#[derive(Default)]
pub(crate) struct DigestHasher(u64);

impl Hasher for DigestHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.rotate_left(8) ^ b as u64;
        }
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

pub(crate) struct KeyIndex {
    heads: HashMap<u64, EntryId, BuildHasherDefault<DigestHasher>>,
}

impl KeyIndex {
    pub fn with_capacity(capacity: u32) -> Result<Self, TryReserveError> {
        let mut heads: HashMap<u64, EntryId, BuildHasherDefault<DigestHasher>> =
            HashMap::with_hasher(Default::default());
        heads.try_reserve(capacity as usize)?;
        Ok(Self { heads })
    }

    pub fn find(&self, pool: &EntryPool, hash: u64, search: &PccSearch<'_>) -> Option<EntryId> {
        let mut cur = self.heads.get(&hash).copied();
        while let Some(id) = cur {
            let entry = pool.entry(id);
            if search.matches(entry.key()) {
                return Some(id);
            }
            cur = entry.chain;
        }
        None
    }

    /// Links a fully initialized entry. The chain pointer is written before
    /// the entry becomes the bucket head.
    pub fn insert(&mut self, pool: &mut EntryPool, hash: u64, id: EntryId) {
        let head = self.heads.get(&hash).copied();
        pool.entry_mut(id).chain = head;
        self.heads.insert(hash, id);
    }

    /// Unlinks `id` from the chain under `hash`. Panics if absent.
    pub fn remove(&mut self, pool: &mut EntryPool, hash: u64, id: EntryId) {
        let next = pool.entry(id).chain;
        let head = self
            .heads
            .get(&hash)
            .copied()
            .unwrap_or_else(|| panic!("entry {:?} missing from key index", id));
        if head == id {
            match next {
                Some(n) => {
                    self.heads.insert(hash, n);
                }
                None => {
                    self.heads.remove(&hash);
                }
            }
        } else {
            let mut prev = head;
            loop {
                match pool.entry(prev).chain {
                    Some(c) if c == id => break,
                    Some(c) => prev = c,
                    None => panic!("entry {:?} missing from key index chain", id),
                }
            }
            pool.entry_mut(prev).chain = next;
        }
        pool.entry_mut(id).chain = None;
    }

    /// Number of distinct digests.
    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.heads.len()
    }

    pub fn chain(&self, pool: &EntryPool, hash: u64) -> Vec<EntryId> {
        let mut ids = Vec::new();
        let mut cur = self.heads.get(&hash).copied();
        while let Some(id) = cur {
            ids.push(id);
            cur = pool.entry(id).chain;
        }
        ids
    }

    pub fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.heads.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PccEntry;

    fn add(pool: &mut EntryPool, idx: &mut KeyIndex, hash: u64, name: &[u8]) -> EntryId {
        let id = pool
            .alloc(PccEntry::new(hash, PccSearch::new(name).to_key()))
            .unwrap();
        idx.insert(pool, hash, id);
        id
    }

    #[test]
    fn colliding_names_are_disambiguated() {
        let mut pool = EntryPool::new(8).unwrap();
        let mut idx = KeyIndex::with_capacity(8).unwrap();
        let a = add(&mut pool, &mut idx, 7, b"/a");
        let b = add(&mut pool, &mut idx, 7, b"/b");
        assert_eq!(idx.find(&pool, 7, &PccSearch::new(b"/a")), Some(a));
        assert_eq!(idx.find(&pool, 7, &PccSearch::new(b"/b")), Some(b));
        assert_eq!(idx.find(&pool, 7, &PccSearch::new(b"/c")), None);
        assert_eq!(idx.find(&pool, 8, &PccSearch::new(b"/a")), None);
        assert_eq!(idx.bucket_count(), 1);
    }

    #[test]
    fn remove_from_middle_of_chain() {
        let mut pool = EntryPool::new(8).unwrap();
        let mut idx = KeyIndex::with_capacity(8).unwrap();
        let a = add(&mut pool, &mut idx, 1, b"/a");
        let b = add(&mut pool, &mut idx, 1, b"/b");
        let c = add(&mut pool, &mut idx, 1, b"/c");
        assert_eq!(idx.chain(&pool, 1), vec![c, b, a]);
        idx.remove(&mut pool, 1, b);
        assert_eq!(idx.chain(&pool, 1), vec![c, a]);
        idx.remove(&mut pool, 1, c);
        assert_eq!(idx.chain(&pool, 1), vec![a]);
        idx.remove(&mut pool, 1, a);
        assert_eq!(idx.bucket_count(), 0);
    }
}
