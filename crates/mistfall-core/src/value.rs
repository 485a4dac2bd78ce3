//! The row representation shared by every layer above the schema model.
//!
//! A row is a JSON object: `serde_json`'s `Map` (built with the `preserve_order`
//! feature, so field order follows insertion rather than a `BTreeMap`'s
//! alphabetical order) gives us a structural-clone facility for free --
//! columns of kind *structured-value* may nest arbitrarily and must not be
//! corrupted when a row crosses a boundary.

/// A single cell value. Re-exported as-is from `serde_json` rather than
/// reinvented: its `Number`/`String`/`Bool`/`Array`/`Object`/`Null` variants
/// already cover every [`ColumnKind`](crate::ColumnKind) this runtime
/// declares, including the structured-value and enumerated-string kinds.
pub type Value = serde_json::Value;

/// A row: an ordered mapping from column name to value.
pub type Row = serde_json::Map<String, Value>;

/// Deep-clones a row for a boundary crossing (a `select`/`insert` result
/// handed back to the caller). `Row::clone` already recurses through nested
/// arrays/objects, so this is a thin, documented alias rather than a new
/// mechanism -- callers mutating the returned row must never observe it
/// reflected back into stored state.
pub fn clone_row(row: &Row) -> Row {
    row.clone()
}
