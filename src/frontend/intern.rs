use std::sync::RwLock;

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Process wide table of identifier strings. Interned strings are leaked and
/// live for the rest of the process, which keeps `Symbol` a plain `Copy` id.
#[derive(Debug, Default)]
struct InterningTable {
    strings: Vec<&'static str>,
    indices: HashMap<&'static str, u32>,
}

static INTERNING_TABLE: Lazy<RwLock<InterningTable>> = Lazy::new(Default::default);

/// An interned identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl Symbol {
    pub fn new(value: &str) -> Self {
        if let Some(index) = INTERNING_TABLE
            .read()
            .unwrap()
            .indices
            .get(value)
            .copied()
        {
            return Self(index);
        }

        let mut table = INTERNING_TABLE.write().unwrap();

        // another writer may have won the race between the two locks
        if let Some(index) = table.indices.get(value).copied() {
            return Self(index);
        }

        let leaked: &'static str = Box::leak(value.to_owned().into_boxed_str());
        let index = table.strings.len() as u32;

        table.strings.push(leaked);
        table.indices.insert(leaked, index);

        Self(index)
    }

    pub fn value(self) -> &'static str {
        INTERNING_TABLE.read().unwrap().strings[self.0 as usize]
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({:?})", self.value())
    }
}

impl core::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.value())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;

        Ok(Self::new(&value))
    }
}
