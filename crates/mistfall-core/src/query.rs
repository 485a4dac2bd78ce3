//! The query evaluator: `{where, orderBy, order, limit, offset}` applied
//! to an already-materialized row list. There is no push-down to either
//! backing store -- both backends hand this evaluator the full row set for
//! a table and it filters/sorts/paginates in the caller's address space.
//! Index-accelerated planning is out of scope by design.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::predicate::Predicate;
use crate::value::{Row, Value, clone_row};

/// Sort direction for `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending (the default).
    #[default]
    Asc,
    /// Descending: computed by sorting ascending, then reversing -- so ties
    /// keep their pre-sort relative order either way.
    Desc,
}

/// How to derive a row's sort key.
#[derive(Clone)]
pub enum OrderBy {
    /// Sort by a column's value directly.
    Column(String),
    /// Sort by a caller-supplied key function. Keys should be scalar
    /// (numbers, strings, booleans) -- comparing two
    /// non-scalar keys falls back to `Ordering::Equal`, preserving stable
    /// order rather than panicking.
    Key(Arc<dyn Fn(&Row) -> Value + Send + Sync>),
}

impl std::fmt::Debug for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderBy::Column(name) => f.debug_tuple("Column").field(name).finish(),
            OrderBy::Key(_) => f.write_str("Key(..)"),
        }
    }
}

impl OrderBy {
    fn key(&self, row: &Row) -> Value {
        match self {
            OrderBy::Column(name) => row.get(name).cloned().unwrap_or(Value::Null),
            OrderBy::Key(f) => f(row),
        }
    }
}

impl From<&str> for OrderBy {
    fn from(column: &str) -> Self {
        OrderBy::Column(column.to_string())
    }
}

impl From<String> for OrderBy {
    fn from(column: String) -> Self {
        OrderBy::Column(column)
    }
}

/// Compares two scalar JSON values. Numbers compare numerically, strings
/// and booleans compare lexicographically/by truthiness; any other pairing
/// (including two structurally different kinds) is `Equal`, which is what
/// keeps a stable sort stable instead of panicking on non-scalar keys.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => Ordering::Equal,
    }
}

/// Options accepted by `select`.
#[derive(Clone, Default)]
pub struct QueryOptions {
    /// Keeps only rows for which this predicate returns `true`.
    pub r#where: Option<Predicate>,
    /// Sort key selector.
    pub order_by: Option<OrderBy>,
    /// Sort direction; ignored if `order_by` is unset.
    pub order: Order,
    /// Skips this many rows after filtering/sorting. Defaults to 0.
    pub offset: usize,
    /// Caps the result at this many rows. Defaults to the filtered length.
    pub limit: Option<usize>,
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("has_where", &self.r#where.is_some())
            .field("order_by", &self.order_by)
            .field("order", &self.order)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}

impl QueryOptions {
    /// An unfiltered, unordered, unpaginated query.
    pub fn all() -> Self {
        Self::default()
    }

    /// Sets the predicate.
    pub fn r#where(mut self, predicate: Predicate) -> Self {
        self.r#where = Some(predicate);
        self
    }

    /// Sets the sort key and, optionally, direction.
    pub fn order_by(mut self, order_by: impl Into<OrderBy>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Sets the sort direction.
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Sets the offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Applies `{where, orderBy, order, limit, offset}` to `rows` and returns
/// deep-cloned copies -- the evaluator never hands back references into the
/// backend's own storage.
pub fn evaluate(rows: &[Row], options: &QueryOptions) -> Vec<Row> {
    let mut filtered: Vec<&Row> = match &options.r#where {
        Some(predicate) => rows.iter().filter(|r| predicate(r)).collect(),
        None => rows.iter().collect(),
    };

    if let Some(order_by) = &options.order_by {
        filtered.sort_by(|a, b| compare_values(&order_by.key(a), &order_by.key(b)));
        if options.order == Order::Desc {
            filtered.reverse();
        }
    }

    let len = filtered.len();
    let offset = options.offset.min(len);
    let end = options
        .limit
        .map(|limit| offset.saturating_add(limit).min(len))
        .unwrap_or(len);

    filtered[offset..end].iter().map(|r| clone_row(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::eq;
    use serde_json::json;

    fn row(id: i64, v: i64) -> Row {
        let mut r = Row::new();
        r.insert("id".into(), json!(id));
        r.insert("v".into(), json!(v));
        r
    }

    #[test]
    fn filters_orders_paginates() {
        let rows: Vec<Row> = (1..=5).map(|id| row(id, id % 3)).collect();
        let options = QueryOptions::all()
            .r#where(eq("v", json!(1)))
            .order_by("id")
            .order(Order::Desc)
            .offset(1)
            .limit(1);

        let result = evaluate(&rows, &options);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(1));
    }

    #[test]
    fn stable_sort_preserves_ties() {
        let rows = vec![row(1, 0), row(2, 0), row(3, 0)];
        let result = evaluate(&rows, &QueryOptions::all().order_by("v"));
        let ids: Vec<i64> = result.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn default_limit_is_filtered_length() {
        let rows: Vec<Row> = (1..=3).map(|id| row(id, 0)).collect();
        let result = evaluate(&rows, &QueryOptions::all());
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn clone_isolation() {
        let rows = vec![row(1, 0)];
        let mut result = evaluate(&rows, &QueryOptions::all());
        result[0].insert("id".into(), json!(999));
        let result2 = evaluate(&rows, &QueryOptions::all());
        assert_eq!(result2[0]["id"], json!(1));
    }
}
