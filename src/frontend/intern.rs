use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::macros::ice;

#[derive(Debug, Default)]
struct Strings {
    values: Vec<&'static str>,
    indices: HashMap<&'static str, u32>,
}

#[derive(Debug, Default)]
pub struct InterningTable {
    strings: RwLock<Strings>,
}

pub static INTERNING_TABLE: Lazy<Arc<InterningTable>> = Lazy::new(Default::default);

impl InterningTable {
    pub fn get(&self, index: u32) -> Option<&'static str> {
        let strings = self.strings.read().unwrap_or_else(PoisonError::into_inner);

        strings.values.get(index as usize).copied()
    }

    pub fn insert_if_absent(&self, string: &str) -> u32 {
        if let Some(index) = self.index_of(string) {
            return index;
        }

        let mut strings = self.strings.write().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have won the race between the read and the write
        if let Some(&index) = strings.indices.get(string) {
            return index;
        }

        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = strings.values.len() as u32;

        strings.values.push(leaked);
        strings.indices.insert(leaked, index);

        index
    }

    pub fn index_of(&self, string: &str) -> Option<u32> {
        let strings = self.strings.read().unwrap_or_else(PoisonError::into_inner);

        strings.indices.get(string).copied()
    }
}

/// An index into the string interning table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn new(value: &str) -> Self {
        let index = INTERNING_TABLE.insert_if_absent(value);

        Self(index)
    }

    pub fn value(&self) -> &'static str {
        INTERNING_TABLE.get(self.0).unwrap_or_else(|| {
            ice!(
                "interned symbol {} is missing from the interning table",
                self.0
            )
        })
    }
}

impl From<&str> for InternedSymbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Debug for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InternedSymbol")
            .field(&self.0)
            .field(&self.value())
            .finish()
    }
}

impl core::fmt::Display for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}
