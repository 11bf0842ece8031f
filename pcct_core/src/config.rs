//! Construction parameters for a table.

use crate::constants::{
    DEFAULT_CAPACITY, DEFAULT_CS_DIRECT_CAPACITY, DEFAULT_CS_INDIRECT_CAPACITY,
};
use crate::types::{CsListId, LocalityDomain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcctConfig {
    /// Short unique debug tag, at most `ID_MAX_LEN` bytes.
    pub id: String,
    /// Entry pool size; 2^q - 1 fills hash buckets best.
    pub max_entries: u32,
    pub locality: LocalityDomain,
    /// Entries kept in the direct list before `cs_evict_overflow` trims it.
    pub cs_direct_capacity: u32,
    pub cs_indirect_capacity: u32,
}

impl Default for PcctConfig {
    fn default() -> Self {
        Self {
            id: "pcct".to_string(),
            max_entries: DEFAULT_CAPACITY,
            locality: LocalityDomain::ANY,
            cs_direct_capacity: DEFAULT_CS_DIRECT_CAPACITY,
            cs_indirect_capacity: DEFAULT_CS_INDIRECT_CAPACITY,
        }
    }
}

impl PcctConfig {
    pub fn new(id: impl Into<String>, max_entries: u32) -> Self {
        Self {
            id: id.into(),
            max_entries,
            ..Self::default()
        }
    }

    pub fn locality(mut self, locality: LocalityDomain) -> Self {
        self.locality = locality;
        self
    }

    pub fn cs_capacity(mut self, list: CsListId, capacity: u32) -> Self {
        match list {
            CsListId::Direct => self.cs_direct_capacity = capacity,
            CsListId::Indirect => self.cs_indirect_capacity = capacity,
        }
        self
    }
}
