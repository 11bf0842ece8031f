//! Data structures for the PIT-CS composite table

use crate::constants::{TOKEN_MASK, TOKEN_META_MASK, TOKEN_META_SHIFT};
use crate::cs_list::CsList;
use crate::disk::DiskStore;
use crate::helpers::{name_digest, pack, unpack};
use crate::key_index::KeyIndex;
use crate::pool::EntryPool;
use crate::token_index::TokenIndex;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

/// Stable handle to a table entry: slot index, ABA generation and the tag of
/// the issuing table.
///
/// A handle goes stale the moment its entry is erased; the slot may be reused
/// under a newer generation, so stale handles never alias the new entry.
/// Handles from another table carry a different tag and are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

impl EntryId {
    #[inline]
    pub(crate) fn new(tag: u16, index: u32, gen: u32) -> Self {
        EntryId(pack(tag, gen, index))
    }

    #[inline]
    pub fn index(self) -> u32 {
        unpack(self.0).2
    }

    #[inline]
    pub fn generation(self) -> u32 {
        unpack(self.0).1
    }

    /// Tag of the table that issued this handle.
    #[inline]
    pub fn table_tag(self) -> u16 {
        unpack(self.0).0
    }

    /// Raw form used across the C ABI.
    pub fn to_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        EntryId(raw)
    }
}

/// 48-bit opaque entry reference, safe to hand to another core.
///
/// Never construct one from an arbitrary integer without going through
/// [`Token::from_raw`], which strips the caller metadata bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    /// Keeps the low 48 bits; anything above is caller metadata.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Token(raw & TOKEN_MASK)
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Places `meta` in the upper 16 bits, for carrying in packet metadata.
    #[inline]
    pub fn with_meta(self, meta: u16) -> u64 {
        ((meta as u64) << TOKEN_META_SHIFT) | self.0
    }

    /// Inverse of [`Token::with_meta`].
    #[inline]
    pub fn split(raw: u64) -> (Token, u16) {
        (
            Token::from_raw(raw),
            ((raw & TOKEN_META_MASK) >> TOKEN_META_SHIFT) as u16,
        )
    }

    /// Successor in the 48-bit space; skips 0, which is never issued.
    #[inline]
    pub(crate) fn successor(self) -> Token {
        match (self.0 + 1) & TOKEN_MASK {
            0 => Token(1),
            n => Token(n),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012x}", self.0)
    }
}

/// Memory region the table prefers, e.g. a NUMA socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalityDomain(pub i32);

impl LocalityDomain {
    pub const ANY: LocalityDomain = LocalityDomain(-1);

    pub fn is_any(self) -> bool {
        self.0 < 0
    }
}

impl Default for LocalityDomain {
    fn default() -> Self {
        LocalityDomain::ANY
    }
}

/// Owned match key kept in each entry for collision disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PccKey {
    name: Box<[u8]>,
    fwd_hint: Option<Box<[u8]>>,
}

impl PccKey {
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn fwd_hint(&self) -> Option<&[u8]> {
        self.fwd_hint.as_deref()
    }
}

/// Borrowed lookup descriptor.
///
/// `name` is the name TLV-value; `fwd_hint` is the forwarding hint name, if
/// the Interest carries one. Two keys match when both are byte-equal; a
/// missing hint never matches a present one, even if empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PccSearch<'a> {
    pub name: &'a [u8],
    pub fwd_hint: Option<&'a [u8]>,
}

impl<'a> PccSearch<'a> {
    pub fn new(name: &'a [u8]) -> Self {
        Self { name, fwd_hint: None }
    }

    pub fn with_fwd_hint(mut self, hint: &'a [u8]) -> Self {
        self.fwd_hint = Some(hint);
        self
    }

    /// Default digest for this descriptor.
    pub fn hash(&self) -> u64 {
        name_digest(self.name, self.fwd_hint)
    }

    #[inline]
    pub fn matches(&self, key: &PccKey) -> bool {
        self.name == key.name() && self.fwd_hint == key.fwd_hint()
    }

    pub fn to_key(&self) -> PccKey {
        PccKey {
            name: self.name.into(),
            fwd_hint: self.fwd_hint.map(Into::into),
        }
    }
}

/// Which eviction list a cached entry lives in.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsListId {
    /// Payload resident in memory.
    Direct = 0,
    /// Payload spilled to the disk store.
    Indirect = 1,
}

impl CsListId {
    pub const ALL: [CsListId; 2] = [CsListId::Direct, CsListId::Indirect];

    pub fn name(self) -> &'static str {
        match self {
            CsListId::Direct => "direct",
            CsListId::Indirect => "indirect",
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Disk store slot number; slot 0 is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiskSlot(NonZeroU64);

impl DiskSlot {
    pub fn new(slot: u64) -> Option<Self> {
        NonZeroU64::new(slot).map(DiskSlot)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Cached response held by an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsPayload {
    Direct(Vec<u8>),
    Indirect(DiskSlot),
}

impl CsPayload {
    pub fn list(&self) -> CsListId {
        match self {
            CsPayload::Direct(_) => CsListId::Direct,
            CsPayload::Indirect(_) => CsListId::Indirect,
        }
    }
}

/// Recency list links. Only meaningful while `list` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CsNode {
    pub prev: Option<EntryId>,
    pub next: Option<EntryId>,
    pub list: Option<CsListId>,
}

/// A PIT record, a CS record, or both for the same name.
#[derive(Debug)]
pub struct PccEntry {
    key: PccKey,
    hash: u64,
    pub(crate) token: Option<Token>,
    pub(crate) chain: Option<EntryId>,
    pub(crate) node: CsNode,
    pub(crate) cs: Option<CsPayload>,
    /// PIT slots: `[0]` without MustBeFresh, `[1]` with MustBeFresh.
    pub pit: [bool; 2],
}

impl PccEntry {
    pub(crate) fn new(hash: u64, key: PccKey) -> Self {
        Self {
            key,
            hash,
            token: None,
            chain: None,
            node: CsNode::default(),
            cs: None,
            pit: [false; 2],
        }
    }

    pub fn key(&self) -> &PccKey {
        &self.key
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<Token> {
        self.token
    }

    /// List this entry is linked into, if cached.
    pub fn cs_list(&self) -> Option<CsListId> {
        self.node.list
    }

    pub fn cs_payload(&self) -> Option<&CsPayload> {
        self.cs.as_ref()
    }

    pub fn has_pit_entry(&self) -> bool {
        self.pit[0] || self.pit[1]
    }

    /// Serves neither role; the owner should erase it.
    pub fn is_unused(&self) -> bool {
        !self.has_pit_entry() && self.cs.is_none()
    }
}

/// PIT-CS composite table (core handle)
pub struct Pcct {
    pub(crate) id: String,
    pub(crate) locality: LocalityDomain,
    pub(crate) pool: EntryPool,
    pub(crate) keys: KeyIndex,
    pub(crate) tokens: TokenIndex,
    pub(crate) cs: [CsList; 2],
    pub(crate) cs_capacity: [u32; 2],
    pub(crate) disk: Option<Arc<dyn DiskStore>>,
    /// Entry handed to an eviction callback and not yet erased.
    pub(crate) evicting: Option<EntryId>,
}

impl fmt::Debug for Pcct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pcct")
            .field("id", &self.id)
            .field("locality", &self.locality)
            .field("capacity", &self.pool.capacity())
            .field("len", &self.pool.len())
            .field("tokens", &self.tokens.len())
            .field("cs_direct", &self.cs[CsListId::Direct.index()].count())
            .field("cs_indirect", &self.cs[CsListId::Indirect.index()].count())
            .finish()
    }
}
