pub mod config;
pub mod constants;
pub mod disk;
pub mod errors;
pub mod handle_registry;
pub mod helpers;
pub mod telemetry;
pub mod types;

mod cs_list;
mod key_index;
mod pool;
mod token_index;

pub use config::PcctConfig;
pub use disk::DiskStore;
pub use errors::Error;
pub use types::{
    CsListId, CsPayload, DiskSlot, EntryId, LocalityDomain, PccEntry, PccKey, PccSearch, Pcct,
    Token,
};

use constants::{ID_MAX_LEN, MAX_CAPACITY};
use cs_list::CsList;
use helpers::is_pow2_minus_one;
use key_index::KeyIndex;
use log::{debug, error, info, trace, warn};
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use pool::EntryPool;
use std::sync::Arc;
use token_index::TokenIndex;

impl Pcct {
    // ---- logging bootstraper -------------------------------------------------
    fn ensure_logging() {
        static INIT: OnceCell<()> = OnceCell::new();
        INIT.get_or_init(|| {
            // Fallback: simple env_logger with timestamps off.
            let _ = env_logger::builder()
                .format_timestamp(None)
                .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
                .try_init();
        });
    }

    /// Create a table with `max_entries` preallocated entries.
    ///
    /// `id` is a debug tag of at most 24 bytes. `max_entries` should be
    /// 2^q - 1; other sizes work but are logged.
    pub fn new(id: &str, max_entries: u32, locality: LocalityDomain) -> Result<Self, Error> {
        Self::with_config(PcctConfig::new(id, max_entries).locality(locality))
    }

    pub fn with_config(config: PcctConfig) -> Result<Self, Error> {
        Self::ensure_logging();
        if config.id.is_empty() || config.id.len() > ID_MAX_LEN {
            return Err(Error::InvalidId(config.id));
        }
        if config.max_entries == 0 {
            return Err(Error::ZeroCapacity);
        }
        if config.max_entries > MAX_CAPACITY {
            return Err(Error::CapacityExceeded);
        }
        if !is_pow2_minus_one(config.max_entries) {
            warn!(
                "[NEW] {}: max_entries={} is not 2^q-1; hash buckets will be unevenly filled",
                config.id, config.max_entries
            );
        }

        let max = config.max_entries;
        let reserve_failed = |what: &str, e: std::collections::TryReserveError| {
            error!("[NEW] {}: cannot reserve {} for {} entries: {}", config.id, what, max, e);
            Error::CapacityExceeded
        };
        let pool = EntryPool::new(max).map_err(|e| reserve_failed("entry pool", e))?;
        let keys = KeyIndex::with_capacity(max).map_err(|e| reserve_failed("key index", e))?;
        let tokens = TokenIndex::with_capacity(max).map_err(|e| reserve_failed("token index", e))?;

        let pcct = Self {
            pool,
            keys,
            tokens,
            cs: [CsList::new(CsListId::Direct), CsList::new(CsListId::Indirect)],
            cs_capacity: [config.cs_direct_capacity, config.cs_indirect_capacity],
            disk: None,
            evicting: None,
            locality: config.locality,
            id: config.id,
        };
        info!(
            "[NEW] {}: tag={} capacity={} cs_capacity={:?}",
            pcct.id,
            pcct.pool.tag(),
            max,
            pcct.cs_capacity
        );
        if pcct.locality.is_any() {
            debug!("[NEW] {}: no locality preference", pcct.id);
        } else {
            debug!("[NEW] {}: locality={}", pcct.id, pcct.locality.0);
        }
        Ok(pcct)
    }

    /// Release all memory. Every `EntryId` and `Token` from this table is dead.
    pub fn close(self) {
        info!("[CLOSE] {}: {} entries dropped", self.id, self.pool.len());
    }

    /// Attach the collaborator that owns on-disk payloads.
    pub fn set_disk_store(&mut self, store: Arc<dyn DiskStore>) {
        self.disk = Some(store);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn locality(&self) -> LocalityDomain {
        self.locality
    }

    pub fn len(&self) -> usize {
        self.pool.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pool.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity() as usize
    }

    pub fn available_capacity(&self) -> usize {
        self.pool.available() as usize
    }

    /// Emit gauges (caller decides cadence).
    pub fn report_capacity_metrics(&self) {
        gauge!("pcct_free_entries", "table" => self.id.clone()).set(self.available_capacity() as f64);
        gauge!("pcct_tokens", "table" => self.id.clone()).set(self.tokens.len() as f64);
        for list in CsListId::ALL {
            gauge!("pcct_cs_entries", "table" => self.id.clone(), "list" => list.name())
                .set(self.cs_count(list) as f64);
        }
    }

    // ------------------------------------------------------------------- //
    // Key index
    // ------------------------------------------------------------------- //

    /// Insert or find an entry. Returns the entry and whether it is new.
    ///
    /// On `CapacityExceeded` nothing was created; evict and retry.
    pub fn insert(&mut self, hash: u64, search: &PccSearch<'_>) -> Result<(EntryId, bool), Error> {
        if let Some(id) = self.keys.find(&self.pool, hash, search) {
            trace!("[INSERT] {}: hit hash={:x} entry={:?}", self.id, hash, id);
            return Ok((id, false));
        }

        let entry = PccEntry::new(hash, search.to_key());
        let id = match self.pool.alloc(entry) {
            Some(id) => id,
            None => {
                counter!("pcct_insert_failures_total", "table" => self.id.clone()).increment(1);
                error!(
                    "[INSERT] {}: pool exhausted ({} entries)",
                    self.id,
                    self.pool.capacity()
                );
                return Err(Error::CapacityExceeded);
            }
        };
        self.keys.insert(&mut self.pool, hash, id);
        counter!("pcct_inserts_total", "table" => self.id.clone()).increment(1);
        trace!("[INSERT] {}: new hash={:x} entry={:?}", self.id, hash, id);
        self.debug_check();
        Ok((id, true))
    }

    pub fn find(&self, hash: u64, search: &PccSearch<'_>) -> Option<EntryId> {
        let found = self.keys.find(&self.pool, hash, search);
        trace!("[FIND] {}: hash={:x} found={:?}", self.id, hash, found);
        found
    }

    /// Remove an entry from every index and return its slot to the pool.
    ///
    /// # Panics
    /// If `id` was already erased or belongs to another table.
    pub fn erase(&mut self, id: EntryId) {
        let entry = self.pool.entry(id);
        let (hash, token, list) = (entry.hash(), entry.token, entry.node.list);

        self.keys.remove(&mut self.pool, hash, id);
        if let Some(token) = token {
            self.tokens.remove(token);
        }
        if let Some(list) = list {
            self.cs[list.index()].remove(&mut self.pool, id);
        }
        let entry = self.pool.free(id);

        if let Some(CsPayload::Indirect(slot)) = entry.cs {
            match &self.disk {
                Some(disk) => disk.release(slot),
                None => warn!(
                    "[ERASE] {}: no disk store attached, slot {} leaked",
                    self.id,
                    slot.get()
                ),
            }
        }
        counter!("pcct_erases_total", "table" => self.id.clone()).increment(1);
        trace!("[ERASE] {}: entry={:?}", self.id, id);
        self.debug_check();
    }

    pub fn entry(&self, id: EntryId) -> Option<&PccEntry> {
        self.pool.get(id)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut PccEntry> {
        self.pool.get_mut(id)
    }

    // ------------------------------------------------------------------- //
    // Token index
    // ------------------------------------------------------------------- //

    /// Assign a token to an entry. Returns the new or existing token.
    pub fn add_token(&mut self, id: EntryId) -> Result<Token, Error> {
        match self.pool.entry(id).token {
            Some(token) => Ok(token),
            None => self.issue_token(id),
        }
    }

    fn issue_token(&mut self, id: EntryId) -> Result<Token, Error> {
        assert!(
            !self.pool.entry(id).has_token(),
            "entry {:?} already holds a token",
            id
        );
        let token = match self.tokens.next_free() {
            Some(t) => t,
            None => {
                error!("[TOKEN] {}: every token value is live", self.id);
                return Err(Error::CapacityExceeded);
            }
        };
        self.tokens.insert(token, id);
        self.pool.entry_mut(id).token = Some(token);
        counter!("pcct_tokens_issued_total", "table" => self.id.clone()).increment(1);
        trace!("[TOKEN] {}: entry={:?} token={}", self.id, id, token);
        Ok(token)
    }

    /// Clear the token on an entry. No-op without one.
    pub fn remove_token(&mut self, id: EntryId) {
        let entry = self.pool.entry_mut(id);
        if let Some(token) = entry.token.take() {
            let removed = self.tokens.remove(token);
            debug_assert_eq!(removed, Some(id));
        }
    }

    /// Find an entry by token; only the lower 48 bits of `token` count.
    pub fn find_by_token(&self, token: u64) -> Option<EntryId> {
        let found = self.tokens.get(Token::from_raw(token));
        trace!("[FIND] {}: token={:x} found={:?}", self.id, token, found);
        found
    }

    /// Most recently issued token value.
    pub fn last_token(&self) -> Token {
        self.tokens.last()
    }

    // ------------------------------------------------------------------- //
    // CS lists
    // ------------------------------------------------------------------- //

    /// Store a payload on an entry and link it at the back of its list.
    ///
    /// # Panics
    /// If the entry is already cached.
    pub fn cs_append(&mut self, id: EntryId, payload: CsPayload) {
        let list = payload.list();
        self.cs[list.index()].append(&mut self.pool, id);
        self.pool.entry_mut(id).cs = Some(payload);
        self.debug_check();
    }

    /// Unlink a cached entry and hand back its payload. The entry itself
    /// stays in the table.
    ///
    /// # Panics
    /// If the entry is not linked into a list.
    pub fn cs_remove(&mut self, id: EntryId) -> CsPayload {
        let list = self.linked_list(id);
        self.cs[list.index()].remove(&mut self.pool, id);
        let payload = self.pool.entry_mut(id).cs.take();
        self.debug_check();
        payload.unwrap_or_else(|| panic!("cached entry {:?} has no payload", id))
    }

    /// Mark a cached entry most recently used.
    pub fn cs_move_to_last(&mut self, id: EntryId) {
        let list = self.linked_list(id);
        self.cs[list.index()].move_to_last(&mut self.pool, id);
    }

    fn linked_list(&self, id: EntryId) -> CsListId {
        self.pool
            .entry(id)
            .node
            .list
            .unwrap_or_else(|| panic!("entry {:?} is not linked into a CS list", id))
    }

    /// Evict up to `max` entries from the front of `list`.
    ///
    /// Each entry is unlinked before `cb` sees it, and `cb` must erase it
    /// through [`Pcct::erase`]. Calling [`Pcct::cs_remove`] on it panics.
    /// Stops early once the list is empty. Returns the number evicted.
    pub fn cs_evict_bulk<F>(&mut self, list: CsListId, max: u32, mut cb: F) -> u32
    where
        F: FnMut(&mut Pcct, EntryId),
    {
        let mut evicted = 0;
        while evicted < max {
            let id = match self.cs[list.index()].pop_front(&mut self.pool) {
                Some(id) => id,
                None => break,
            };
            self.evicting = Some(id);
            cb(&mut *self, id);
            self.evicting = None;
            assert!(
                !self.pool.contains(id),
                "eviction callback left entry {:?} in the table",
                id
            );
            evicted += 1;
        }
        if evicted > 0 {
            counter!("pcct_evictions_total", "table" => self.id.clone(), "list" => list.name())
                .increment(evicted as u64);
            debug!(
                "[EVICT] {}: {} {} entries evicted, {} left",
                self.id,
                evicted,
                list.name(),
                self.cs[list.index()].count()
            );
        }
        evicted
    }

    /// Trim each list to its configured capacity, indirect list first.
    pub fn cs_evict_overflow(&mut self) -> u32 {
        let mut total = 0;
        for list in [CsListId::Indirect, CsListId::Direct] {
            let count = self.cs[list.index()].count();
            let cap = self.cs_capacity[list.index()];
            if count > cap {
                total += self.cs_evict_bulk(list, count - cap, |pcct, id| pcct.erase(id));
            }
        }
        total
    }

    pub fn cs_count(&self, list: CsListId) -> usize {
        self.cs[list.index()].count() as usize
    }

    pub fn cs_capacity(&self, list: CsListId) -> usize {
        self.cs_capacity[list.index()] as usize
    }

    /// Entries of `list`, least recently used first.
    pub fn cs_ids(&self, list: CsListId) -> Vec<EntryId> {
        self.cs[list.index()].ids(&self.pool)
    }

    // ------------------------------------------------------------------- //
    // Consistency
    // ------------------------------------------------------------------- //

    /// Walk every structure and panic on any cross-structure inconsistency.
    pub fn validate_invariants(&self) {
        let mut live = 0usize;
        let mut tokened = 0usize;
        let mut linked = [0usize; 2];
        for (id, entry) in self.pool.iter() {
            live += 1;
            let search = PccSearch {
                name: entry.key().name(),
                fwd_hint: entry.key().fwd_hint(),
            };
            assert_eq!(
                self.keys.find(&self.pool, entry.hash(), &search),
                Some(id),
                "entry {:?} unreachable from key index",
                id
            );
            if let Some(token) = entry.token {
                tokened += 1;
                assert_eq!(self.tokens.get(token), Some(id), "token {} stale", token);
            }
            // the eviction victim is already unlinked but keeps its payload
            // until the callback erases it
            if self.evicting != Some(id) {
                assert_eq!(
                    entry.node.list,
                    entry.cs.as_ref().map(CsPayload::list),
                    "entry {:?} payload and list disagree",
                    id
                );
            }
            if let Some(list) = entry.node.list {
                linked[list.index()] += 1;
            }
        }
        assert_eq!(live, self.pool.len() as usize, "pool count mismatch");

        let chained: usize = self
            .keys
            .hashes()
            .map(|h| self.keys.chain(&self.pool, h).len())
            .sum();
        assert_eq!(chained, live, "key index holds entries outside the pool");

        assert_eq!(tokened, self.tokens.len(), "token index count mismatch");
        for (token, id) in self.tokens.iter() {
            assert_eq!(self.pool.entry(id).token, Some(token));
        }

        for list in CsListId::ALL {
            self.cs[list.index()].validate(&self.pool);
            assert_eq!(linked[list.index()], self.cs_count(list));
        }
    }

    #[inline(always)]
    fn debug_check(&self) {
        #[cfg(feature = "trace")]
        self.validate_invariants();
    }
} // end impl Pcct

impl Drop for Pcct {
    fn drop(&mut self) {
        debug!("[DROP] {}: releasing {} slots", self.id, self.pool.capacity());
    }
}

// Public module for C API functions
pub mod public_api;

// Re-export all public API functions at the crate root
pub use public_api::*;
