//! Interned strings and the global symbol table.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A heap string with a cached hash. Symbols (keys, identifiers) are
/// interned through [`getsym`] so that equal names share one allocation;
/// string literals are created directly and compare by content.
#[derive(Debug)]
pub struct Str {
    s: String,
    hash: i64,
}

impl Str {
    pub fn new(s: &str) -> Self {
        Str {
            hash: hash_str(s),
            s: s.to_string(),
        }
    }

    pub fn from_string(s: String) -> Self {
        Str {
            hash: hash_str(&s),
            s,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.s
    }

    #[inline]
    pub fn hash(&self) -> i64 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.s == other.s
    }
}

impl Eq for Str {}

/// One-at-a-time string hash (Bob Jenkins), widened to 64 bits by a final
/// integer mix so the workspace tree gets well-spread keys.
pub fn hash_str(s: &str) -> i64 {
    let mut hash: i32 = 0;
    for b in s.bytes() {
        hash = hash.wrapping_add(b as i32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash64(hash as i64)
}

/// Thomas Wang's 64 bit integer hash.
#[inline]
pub fn hash64(key: i64) -> i64 {
    let mut hash = key as u64;
    hash ^= (!hash) >> 31;
    hash = hash.wrapping_add(hash << 28);
    hash ^= hash >> 21;
    hash = hash.wrapping_add(hash << 3);
    hash ^= (!hash) >> 5;
    hash = hash.wrapping_add(hash << 13);
    hash ^= hash >> 27;
    hash = hash.wrapping_add(hash << 32);
    hash as i64
}

lazy_static! {
    static ref SYMBOL_TABLE: Mutex<HashMap<String, Arc<Str>>> = Mutex::new(HashMap::new());
}

/// Intern a symbol. Returns the unique shared `Str` for `name`;
/// repeated calls with the same name return the same allocation.
pub fn getsym(name: &str) -> Arc<Str> {
    let mut table = SYMBOL_TABLE.lock().unwrap();
    if let Some(sym) = table.get(name) {
        return sym.clone();
    }
    let sym = Arc::new(Str::new(name));
    table.insert(name.to_string(), sym.clone());
    sym
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_shared() {
        let a = getsym("osc");
        let b = getsym("osc");
        assert!(Arc::ptr_eq(&a, &b));
        let c = getsym("osc2");
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn hash_is_stable_and_spread() {
        assert_eq!(hash_str("freq"), hash_str("freq"));
        assert_ne!(hash_str("freq"), hash_str("freq2"));
        assert_ne!(hash_str("a"), hash_str("b"));
    }
}
