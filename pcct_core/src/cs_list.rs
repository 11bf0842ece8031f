//! Recency-ordered list of cached entries, one per storage class.
//!
//! Links live in the entries (`PccEntry::node`) and are addressed by
//! `EntryId`, so append, remove and move are O(1) without pointer chasing.
//! Front is least recently touched; back is most recent.
//!
//! ```text
//!   head ─► [A] ◄──► [B] ◄──► [C] ◄── tail
//!            ▲ evicted first
//! ```

use crate::pool::EntryPool;
use crate::types::{CsListId, CsNode, EntryId};

pub(crate) struct CsList {
    id: CsListId,
    head: Option<EntryId>,
    tail: Option<EntryId>,
    count: u32,
}

impl CsList {
    pub fn new(id: CsListId) -> Self {
        Self {
            id,
            head: None,
            tail: None,
            count: 0,
        }
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn append(&mut self, pool: &mut EntryPool, id: EntryId) {
        let node = &mut pool.entry_mut(id).node;
        assert!(
            node.list.is_none(),
            "append of entry {:?} already linked into {:?} list",
            id,
            node.list
        );
        *node = CsNode {
            prev: self.tail,
            next: None,
            list: Some(self.id),
        };
        match self.tail {
            Some(t) => pool.entry_mut(t).node.next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.count += 1;
    }

    pub fn remove(&mut self, pool: &mut EntryPool, id: EntryId) {
        let node = pool.entry(id).node;
        assert_eq!(
            node.list,
            Some(self.id),
            "remove of entry {:?} not linked into {:?} list",
            id,
            self.id
        );
        match node.prev {
            Some(p) => pool.entry_mut(p).node.next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => pool.entry_mut(n).node.prev = node.prev,
            None => self.tail = node.prev,
        }
        pool.entry_mut(id).node = CsNode::default();
        self.count -= 1;
    }

    pub fn move_to_last(&mut self, pool: &mut EntryPool, id: EntryId) {
        if self.tail == Some(id) {
            assert_eq!(pool.entry(id).node.list, Some(self.id));
            return;
        }
        self.remove(pool, id);
        self.append(pool, id);
    }

    /// Unlinks and returns the least recently touched entry.
    pub fn pop_front(&mut self, pool: &mut EntryPool) -> Option<EntryId> {
        let id = self.head?;
        self.remove(pool, id);
        Some(id)
    }

    /// Front to back.
    pub fn ids(&self, pool: &EntryPool) -> Vec<EntryId> {
        let mut ids = Vec::with_capacity(self.count as usize);
        let mut cur = self.head;
        while let Some(id) = cur {
            ids.push(id);
            cur = pool.entry(id).node.next;
        }
        ids
    }

    /// Walks both directions and checks links and count. Panics on mismatch.
    pub fn validate(&self, pool: &EntryPool) {
        let mut prev = None;
        let mut cur = self.head;
        let mut n = 0u32;
        while let Some(id) = cur {
            let node = pool.entry(id).node;
            assert_eq!(node.list, Some(self.id), "{:?} in wrong list", id);
            assert_eq!(node.prev, prev, "{:?} has broken prev link", id);
            n += 1;
            assert!(n <= self.count, "{:?} list is cyclic or miscounted", self.id);
            prev = cur;
            cur = node.next;
        }
        assert_eq!(prev, self.tail, "{:?} list tail mismatch", self.id);
        assert_eq!(n, self.count, "{:?} list count mismatch", self.id);
    }
}
