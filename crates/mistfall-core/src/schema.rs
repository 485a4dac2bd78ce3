//! The schema model: tables, columns, indexes, and the resolved
//! foreign-key metadata that the reference resolver materializes onto them.
//!
//! A [`Schema`] is built once, from a set of [`Table`] descriptors, and is
//! read-only thereafter -- every field here is `pub` so the runtime and
//! backend crates can walk it freely, but nothing in this crate ever mutates
//! a `Schema` after [`Schema::build`] returns it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{Result, SchemaError};
use crate::value::{Row, Value};

/// What happens to a dependent row when the row it references is deleted.
///
/// Only [`OnDelete::Restrict`] is enforced by the runtime; `Cascade`
/// is recognized and stored but currently treated identically -- see
/// DESIGN.md for the resolved open question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Reject the delete while a dependent row exists.
    Restrict,
    /// Recorded but not implemented; treated as `Restrict` by the delete
    /// path (see DESIGN.md).
    Cascade,
}

/// A column's unresolved `references(target_table.target_column)`
/// descriptor, as declared before [`Schema::build`] resolves it.
///
/// There are two common ways to resolve forward references in a cyclic
/// schema: a deferred-thunk pattern, or naming the target by string and
/// resolving once every table exists. This crate takes the latter --
/// references are plain strings, resolved in one pass after all tables are
/// known, with no closures or forward-declaration machinery.
#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    /// Name of the table the column refers to.
    pub target_table: String,
    /// Name of the column on that table.
    pub target_column: String,
    /// Delete behavior for dependents.
    pub on_delete: OnDelete,
}

/// Foreign-key metadata materialized by the reference resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Name of the referenced table.
    pub target_table: String,
    /// Name of the referenced column (always that table's primary key in
    /// every schema this runtime has validated, but stored explicitly since
    /// nothing enforces that invariant at this layer).
    pub target_column: String,
    /// Delete behavior for dependents.
    pub on_delete: OnDelete,
}

/// The semantic kind of a column's values.
///
/// Mirrors the declaration-side column-kind vocabulary one-for-one rather
/// than collapsing to the handful of physical types SQLite or IndexedDB
/// actually store -- `kind` participates in the schema signature and in
/// documentation, even though every kind here maps onto a JSON [`Value`] at
/// the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// A 32-bit-range integer.
    Integer,
    /// A wide integer, represented as a JSON number or numeric string
    /// depending on magnitude.
    BigInteger,
    /// A floating-point number.
    Float,
    /// A fixed-precision decimal, stored as a string to avoid float drift.
    FixedDecimal {
        /// Total significant digits.
        precision: u32,
        /// Digits after the decimal point.
        scale: u32,
    },
    /// A string with a declared maximum length.
    BoundedString {
        /// Maximum length in characters.
        max_len: u32,
    },
    /// A string with no declared maximum length.
    UnboundedString,
    /// A boolean flag.
    Boolean,
    /// A point in time, stored as an RFC 3339 string or epoch-millis number.
    Timestamp,
    /// Arbitrarily nested JSON: objects, arrays, and scalars.
    StructuredValue,
    /// A string constrained to a closed set of variants.
    EnumString {
        /// The allowed values.
        variants: Vec<String>,
    },
}

/// A zero-argument default-value producer, invoked on insert when the
/// caller omitted the column and no literal default is set.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// A one-argument `onUpdate` producer, invoked on update with the row's
/// previous value for the column when the caller's patch did not mention it.
pub type OnUpdateFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A column descriptor.
#[derive(Clone)]
pub struct Column {
    /// Name, unique within its table.
    pub name: String,
    /// Semantic value kind.
    pub kind: ColumnKind,
    /// Rejects null/undefined values in a committed row.
    pub not_null: bool,
    /// Exactly one column per table must set this.
    pub primary_key: bool,
    /// Enforced as a uniqueness constraint (not checked by this runtime
    /// beyond the primary key itself; carried for schema fidelity and for
    /// backends that want to build a native unique index).
    pub unique: bool,
    /// Allocated from the table's identity sequence when omitted on insert.
    pub identity: bool,
    /// A literal value, deep-copied in when the column is omitted and has
    /// no default producer.
    pub default_value: Option<Value>,
    /// A zero-argument producer, preferred over `default_value` when both
    /// are set (matches the order normalization applies them in).
    pub default_fn: Option<DefaultFn>,
    /// Invoked on update when the patch does not explicitly mention this
    /// column.
    pub on_update_fn: Option<OnUpdateFn>,
    /// Declared but not yet resolved into `foreign_key`.
    pub reference: Option<UnresolvedReference>,
    /// Filled in by [`Schema::build`] when `reference` resolves.
    pub foreign_key: Option<ForeignKey>,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("not_null", &self.not_null)
            .field("primary_key", &self.primary_key)
            .field("unique", &self.unique)
            .field("identity", &self.identity)
            .field("default_value", &self.default_value)
            .field("has_default_fn", &self.default_fn.is_some())
            .field("has_on_update_fn", &self.on_update_fn.is_some())
            .field("reference", &self.reference)
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}

impl Column {
    /// Starts a column descriptor of the given name and kind; every
    /// constraint defaults to off.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            not_null: false,
            primary_key: false,
            unique: false,
            identity: false,
            default_value: None,
            default_fn: None,
            on_update_fn: None,
            reference: None,
            foreign_key: None,
        }
    }

    /// Marks the column not-null.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Marks the column as the table's primary key (implies not-null).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Marks the column unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column as an identity column, allocated from the table's
    /// sequence when absent on insert.
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Sets a literal default.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Sets a zero-argument default producer.
    pub fn default_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default_fn = Some(Arc::new(f));
        self
    }

    /// Sets a one-argument `onUpdate` producer.
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.on_update_fn = Some(Arc::new(f));
        self
    }

    /// Declares a deferred reference to another table's column, resolved by
    /// [`Schema::build`].
    pub fn references(
        mut self,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        self.reference = Some(UnresolvedReference {
            target_table: target_table.into(),
            target_column: target_column.into(),
            on_delete,
        });
        self
    }
}

/// Where an index's key comes from.
#[derive(Clone)]
pub enum IndexSource {
    /// One or more source columns, taken verbatim from the row.
    Columns(Vec<String>),
    /// A computed key: `field` is the name the derived value is written
    /// back onto the row under (so the backing store can index it), and
    /// `expression` derives it from the full row.
    Computed {
        /// The row field the derived value is materialized into.
        field: String,
        /// The derivation function.
        expression: Arc<dyn Fn(&Row) -> Value + Send + Sync>,
    },
}

impl fmt::Debug for IndexSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexSource::Columns(cols) => f.debug_tuple("Columns").field(cols).finish(),
            IndexSource::Computed { field, .. } => {
                f.debug_struct("Computed").field("field", field).finish()
            }
        }
    }
}

/// An index descriptor.
#[derive(Debug, Clone)]
pub struct Index {
    /// Name, unique within its table.
    pub name: String,
    /// Whether the backing store should enforce uniqueness on this index.
    pub unique: bool,
    /// Source of the index key.
    pub source: IndexSource,
}

impl Index {
    /// An index over one or more literal source columns.
    pub fn on_columns(name: impl Into<String>, columns: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            unique,
            source: IndexSource::Columns(columns),
        }
    }

    /// A computed index: `field` becomes a real row attribute during
    /// normalization, populated by `expression`.
    pub fn computed<F>(name: impl Into<String>, field: impl Into<String>, unique: bool, expression: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            unique,
            source: IndexSource::Computed {
                field: field.into(),
                expression: Arc::new(expression),
            },
        }
    }
}

/// A table descriptor.
#[derive(Debug, Clone)]
pub struct Table {
    /// Name, unique within its schema.
    pub name: String,
    /// Columns in declaration order -- normalization walks columns in this
    /// order, so it is semantically significant, not cosmetic.
    pub columns: Vec<Column>,
    /// Indexes in declaration order.
    pub indexes: Vec<Index>,
}

impl Table {
    /// Starts a table descriptor with no columns or indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends an index.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Returns the table's sole primary-key column.
    ///
    /// Panics if called before [`Schema::build`] has validated the table --
    /// every `Table` reachable from a built `Schema` is guaranteed to have
    /// exactly one.
    pub fn primary_key(&self) -> &Column {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .expect("table has no primary key; was it validated by Schema::build?")
    }

    /// Looks up a column by name.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for c in &self.columns {
            if !seen.insert(c.name.clone()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: c.name.clone(),
                });
            }
        }
        let pks: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        match pks.len() {
            0 => {
                return Err(SchemaError::MissingPrimaryKey {
                    table: self.name.clone(),
                })
            }
            1 => {}
            _ => {
                return Err(SchemaError::MultiplePrimaryKeys {
                    table: self.name.clone(),
                    columns: pks,
                })
            }
        }
        for index in &self.indexes {
            if let IndexSource::Columns(cols) = &index.source {
                if cols.is_empty() {
                    return Err(SchemaError::EmptyIndexColumns {
                        table: self.name.clone(),
                        index: index.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Options accepted by schema declaration.
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// The schema's name.
    pub name: String,
    /// Monotonic schema version, starting at 1. Drives the upgrade planner;
    /// never used to plan migrations by itself (the signature is
    /// diagnostic only).
    pub version: u32,
    /// Storage-name prefix. Defaults to `name` when not set explicitly.
    pub namespace: Option<String>,
}

impl SchemaOptions {
    /// Starts schema options with the given name, version 1, and the name
    /// reused as namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            namespace: None,
        }
    }

    /// Overrides the schema version.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Overrides the storage namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A resolved, immutable schema.
#[derive(Debug, Clone)]
pub struct Schema {
    /// The schema's name.
    pub name: String,
    /// Monotonic version.
    pub version: u32,
    /// Storage-name prefix.
    pub namespace: String,
    /// Tables in declaration order.
    pub tables: Vec<Table>,
    reverse_deps: HashMap<String, Vec<(String, String)>>,
    signature: String,
}

impl Schema {
    /// Resolves a set of table descriptors into a [`Schema`].
    ///
    /// Runs the two-pass reference resolver: first an index of
    /// table names, then foreign-key materialization for every column
    /// carrying an [`UnresolvedReference`]. Also computes the reverse
    /// dependency map and the schema signature.
    pub fn build(options: SchemaOptions, tables: Vec<Table>) -> Result<Schema> {
        let namespace = options.namespace.clone().unwrap_or_else(|| options.name.clone());

        let mut seen_tables = std::collections::HashSet::new();
        for t in &tables {
            t.validate()?;
            if !seen_tables.insert(t.name.clone()) {
                return Err(SchemaError::DuplicateTable { name: t.name.clone() });
            }
        }

        let by_name: HashMap<String, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        let mut tables = tables;
        let mut reverse_deps: HashMap<String, Vec<(String, String)>> = HashMap::new();

        for i in 0..tables.len() {
            let table_name = tables[i].name.clone();
            for j in 0..tables[i].columns.len() {
                let resolved = {
                    let column = &tables[i].columns[j];
                    match &column.reference {
                        None => None,
                        Some(r) => {
                            let target_idx = *by_name.get(&r.target_table).ok_or_else(|| {
                                SchemaError::UnresolvedReferenceTable {
                                    table: table_name.clone(),
                                    column: column.name.clone(),
                                    target_table: r.target_table.clone(),
                                }
                            })?;
                            let target_table = &tables[target_idx];
                            if target_table.find_column(&r.target_column).is_none() {
                                return Err(SchemaError::UnresolvedReferenceColumn {
                                    table: table_name.clone(),
                                    column: column.name.clone(),
                                    target_table: r.target_table.clone(),
                                    target_column: r.target_column.clone(),
                                });
                            }
                            Some(ForeignKey {
                                target_table: r.target_table.clone(),
                                target_column: r.target_column.clone(),
                                on_delete: r.on_delete,
                            })
                        }
                    }
                };
                if let Some(fk) = resolved {
                    reverse_deps
                        .entry(fk.target_table.clone())
                        .or_default()
                        .push((table_name.clone(), tables[i].columns[j].name.clone()));
                    tables[i].columns[j].foreign_key = Some(fk);
                }
            }
        }

        let signature = compute_signature(&options.name, options.version, &tables);

        Ok(Schema {
            name: options.name,
            version: options.version,
            namespace,
            tables,
            reverse_deps,
            signature,
        })
    }

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// The externally visible storage name for a table: `<namespace>__<table>`.
    pub fn storage_name(&self, table_name: &str) -> String {
        format!("{}__{}", self.namespace, table_name)
    }

    /// The `(source_table, source_column)` pairs that reference `table_name`
    /// via a foreign key -- consulted by the delete path before a row is
    /// removed.
    pub fn reverse_dependencies(&self, table_name: &str) -> &[(String, String)] {
        self.reverse_deps
            .get(table_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// A deterministic hex digest of the schema's shape, stored by the
    /// upgrade planner for diagnostic drift detection. Never consulted to
    /// plan migrations -- the version number does that instead.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

fn compute_signature(name: &str, version: u32, tables: &[Table]) -> String {
    let mut h = Sha256::new();
    const SEP: u8 = 0;

    h.update(name.as_bytes());
    h.update([SEP]);
    h.update(version.to_string().as_bytes());
    h.update([SEP]);

    for table in tables {
        h.update(table.name.as_bytes());
        h.update([SEP]);
        for c in &table.columns {
            h.update(c.name.as_bytes());
            h.update([SEP]);
            h.update(format!("{:?}", c.kind).as_bytes());
            h.update([SEP]);
            let flags = [
                c.not_null,
                c.primary_key,
                c.unique,
                c.identity,
                c.default_value.is_some() || c.default_fn.is_some(),
            ];
            for flag in flags {
                h.update([flag as u8]);
            }
            if let Some(fk) = &c.foreign_key {
                h.update(fk.target_table.as_bytes());
                h.update([SEP]);
                h.update(fk.target_column.as_bytes());
                h.update([matches!(fk.on_delete, OnDelete::Cascade) as u8]);
            }
            h.update([SEP]);
        }
        for idx in &table.indexes {
            h.update(idx.name.as_bytes());
            h.update([idx.unique as u8]);
            match &idx.source {
                IndexSource::Columns(cols) => {
                    for col in cols {
                        h.update(col.as_bytes());
                        h.update([SEP]);
                    }
                }
                IndexSource::Computed { field, .. } => {
                    h.update(field.as_bytes());
                }
            }
            h.update([SEP]);
        }
    }

    format!("{:x}", h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_table() -> Table {
        Table::new("users")
            .column(Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(Column::new("name", ColumnKind::UnboundedString).not_null())
    }

    #[test]
    fn build_resolves_foreign_keys() {
        let users = users_table();
        let todos = Table::new("todos")
            .column(Column::new("id", ColumnKind::Integer).primary_key().identity())
            .column(Column::new("title", ColumnKind::UnboundedString).not_null())
            .column(
                Column::new("owner_id", ColumnKind::Integer)
                    .not_null()
                    .references("users", "id", OnDelete::Restrict),
            );

        let schema = Schema::build(SchemaOptions::new("app"), vec![users, todos]).unwrap();
        let todos = schema.table("todos").unwrap();
        let owner = todos.find_column("owner_id").unwrap();
        let fk = owner.foreign_key.as_ref().unwrap();
        assert_eq!(fk.target_table, "users");
        assert_eq!(fk.target_column, "id");

        let reverse = schema.reverse_dependencies("users");
        assert_eq!(reverse, &[("todos".to_string(), "owner_id".to_string())]);
    }

    #[test]
    fn build_rejects_unresolvable_reference() {
        let todos = Table::new("todos")
            .column(Column::new("id", ColumnKind::Integer).primary_key())
            .column(
                Column::new("owner_id", ColumnKind::Integer)
                    .references("ghosts", "id", OnDelete::Restrict),
            );
        let err = Schema::build(SchemaOptions::new("app"), vec![todos]).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReferenceTable { .. }));
    }

    #[test]
    fn build_rejects_missing_primary_key() {
        let t = Table::new("users").column(Column::new("name", ColumnKind::UnboundedString));
        let err = Schema::build(SchemaOptions::new("app"), vec![t]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingPrimaryKey { .. }));
    }

    #[test]
    fn build_rejects_duplicate_primary_key() {
        let t = Table::new("users")
            .column(Column::new("a", ColumnKind::Integer).primary_key())
            .column(Column::new("b", ColumnKind::Integer).primary_key());
        let err = Schema::build(SchemaOptions::new("app"), vec![t]).unwrap_err();
        assert!(matches!(err, SchemaError::MultiplePrimaryKeys { .. }));
    }

    #[test]
    fn build_rejects_index_with_no_source_columns() {
        let t = Table::new("users")
            .column(Column::new("id", ColumnKind::Integer).primary_key())
            .index(Index::on_columns("by_nothing", vec![], false));
        let err = Schema::build(SchemaOptions::new("app"), vec![t]).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyIndexColumns { .. }));
    }

    #[test]
    fn namespace_defaults_to_name() {
        let schema = Schema::build(SchemaOptions::new("app"), vec![users_table()]).unwrap();
        assert_eq!(schema.namespace, "app");
        assert_eq!(schema.storage_name("users"), "app__users");
    }

    #[test]
    fn signature_is_deterministic_and_shape_sensitive() {
        let s1 = Schema::build(SchemaOptions::new("app"), vec![users_table()]).unwrap();
        let s2 = Schema::build(SchemaOptions::new("app"), vec![users_table()]).unwrap();
        assert_eq!(s1.signature(), s2.signature());

        let mut other = users_table();
        other.columns[1].not_null = false;
        let s3 = Schema::build(SchemaOptions::new("app"), vec![other]).unwrap();
        assert_ne!(s1.signature(), s3.signature());
    }
}
