//! In-memory storage state: per-table ordered row maps and identity
//! sequences, both keyed by storage name (`<namespace>__<table>`).

use std::collections::HashMap;

use indexmap::IndexMap;
use mistfall_core::{Row, Value};

/// A primary-key value, reduced to a hashable/orderable key.
///
/// Primary keys are restricted to integer or bounded-string columns; this
/// is the memory backend's native key type for both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PkKey {
    Int(i64),
    Str(String),
}

impl PkKey {
    /// Converts a row's primary-key cell into a [`PkKey`]. Returns `None`
    /// for any value that is not an integer or a string -- the caller
    /// turns that into a backend error naming the offending table.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(PkKey::Int),
            Value::String(s) => Some(PkKey::Str(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for PkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PkKey::Int(i) => write!(f, "{i}"),
            PkKey::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One table's rows, insertion-ordered: natural iteration order is
/// insertion order for this backend, with no implicit re-sort.
pub type Store = IndexMap<PkKey, Row>;

/// The full mutable state of a [`crate::MemoryBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    /// `storage_name -> (primary_key -> row)`.
    pub stores: HashMap<String, Store>,
    /// `storage_name -> next identity value`.
    pub sequences: HashMap<String, i64>,
}

impl MemoryState {
    /// Returns a snapshot of the current state -- a full clone -- used by
    /// `transaction` to make rollback possible.
    pub fn snapshot(&self) -> MemoryState {
        self.clone()
    }

    /// Restores a prior snapshot in place.
    pub fn restore(&mut self, snapshot: MemoryState) {
        *self = snapshot;
    }
}
