//! Secondary index: token to entry, plus the token counter.

use crate::types::{EntryId, Token};
use log::warn;
use std::collections::{HashMap, TryReserveError};

pub(crate) struct TokenIndex {
    map: HashMap<Token, EntryId>,
    last: Token,
}

impl TokenIndex {
    pub fn with_capacity(capacity: u32) -> Result<Self, TryReserveError> {
        let mut map: HashMap<Token, EntryId> = HashMap::new();
        map.try_reserve(capacity as usize)?;
        Ok(Self {
            map,
            last: Token::from_raw(0),
        })
    }

    /// Draws the next unused value after the last one issued.
    ///
    /// With `n` live tokens, some value among the next `n + 1` is free, so the
    /// probe is bounded; `None` only if the whole space is in use.
    pub fn next_free(&mut self) -> Option<Token> {
        let mut token = self.last;
        for _ in 0..=self.map.len() {
            let next = token.successor();
            if next < token {
                warn!("[TOKEN] counter wrapped after {}", token);
            }
            token = next;
            if !self.map.contains_key(&token) {
                self.last = token;
                return Some(token);
            }
        }
        None
    }

    pub fn insert(&mut self, token: Token, id: EntryId) {
        let prev = self.map.insert(token, id);
        assert!(prev.is_none(), "token {} issued twice", token);
    }

    pub fn remove(&mut self, token: Token) -> Option<EntryId> {
        self.map.remove(&token)
    }

    #[inline]
    pub fn get(&self, token: Token) -> Option<EntryId> {
        self.map.get(&token).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn last(&self) -> Token {
        self.last
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, EntryId)> + '_ {
        self.map.iter().map(|(t, id)| (*t, *id))
    }

    #[cfg(test)]
    pub fn set_last(&mut self, token: Token) {
        self.last = token;
    }
}
