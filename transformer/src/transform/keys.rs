//! Natural key to surrogate key assignment for one dimension.

use std::collections::HashMap;

use crate::models::{NaturalKey, SurrogateKey};

/// Hands out sequential surrogate keys, one per distinct natural key.
///
/// Keys start at `base` and grow by one; a key is never reassigned or reused.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    keys: HashMap<NaturalKey, SurrogateKey>,
    next: u64,
}

/// Outcome of [`KeyRegistry::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// First occurrence; a new key was assigned.
    New(SurrogateKey),
    /// Natural key seen before.
    Existing(SurrogateKey),
}

impl Resolved {
    pub fn key(self) -> SurrogateKey {
        match self {
            Resolved::New(k) | Resolved::Existing(k) => k,
        }
    }
}

impl KeyRegistry {
    pub fn new(base: u64) -> Self {
        Self {
            keys: HashMap::new(),
            next: base,
        }
    }

    /// Look up `key`, assigning the next surrogate key if unseen.
    pub fn resolve(&mut self, key: NaturalKey) -> Resolved {
        if let Some(&existing) = self.keys.get(&key) {
            return Resolved::Existing(existing);
        }
        let assigned = SurrogateKey(self.next);
        self.next += 1;
        self.keys.insert(key, assigned);
        Resolved::New(assigned)
    }

    pub fn get(&self, key: &NaturalKey) -> Option<SurrogateKey> {
        self.keys.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
