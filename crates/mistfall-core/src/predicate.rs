//! Predicate helpers: pure row combinators callers use to build `where`
//! clauses. They hold no state and are part of the stable public surface
//! alongside the schema/query types.

use std::sync::Arc;

use crate::value::{Row, Value};

/// A synchronous row predicate, as accepted by `select`/`update`/`delete`.
pub type Predicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

fn get<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column)
}

/// `row[column] == value`.
pub fn eq(column: impl Into<String>, value: Value) -> Predicate {
    let column = column.into();
    Arc::new(move |row| get(row, &column) == Some(&value))
}

/// `row[column] != value`.
pub fn neq(column: impl Into<String>, value: Value) -> Predicate {
    let column = column.into();
    Arc::new(move |row| get(row, &column) != Some(&value))
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// `row[column] > value`, for numeric columns. Non-numeric comparisons are
/// always `false` rather than panicking.
pub fn gt(column: impl Into<String>, value: Value) -> Predicate {
    let column = column.into();
    Arc::new(move |row| {
        match (get(row, &column).and_then(as_f64), as_f64(&value)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    })
}

/// `row[column] < value`, for numeric columns.
pub fn lt(column: impl Into<String>, value: Value) -> Predicate {
    let column = column.into();
    Arc::new(move |row| {
        match (get(row, &column).and_then(as_f64), as_f64(&value)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    })
}

/// Logical AND of every predicate (vacuously `true` for an empty slice).
pub fn and(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |row| predicates.iter().all(|p| p(row)))
}

/// Logical OR of every predicate (vacuously `false` for an empty slice).
pub fn or(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |row| predicates.iter().any(|p| p(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64, name: &str) -> Row {
        let mut r = Row::new();
        r.insert("id".into(), json!(id));
        r.insert("name".into(), json!(name));
        r
    }

    #[test]
    fn eq_matches_exact_value() {
        let p = eq("id", json!(1));
        assert!(p(&row(1, "a")));
        assert!(!p(&row(2, "a")));
    }

    #[test]
    fn gt_lt_are_numeric() {
        let r = row(5, "a");
        assert!(gt("id", json!(4))(&r));
        assert!(!gt("id", json!(5))(&r));
        assert!(lt("id", json!(6))(&r));
    }

    #[test]
    fn and_or_compose() {
        let r = row(5, "a");
        let both = and(vec![gt("id", json!(1)), eq("name", json!("a"))]);
        assert!(both(&r));
        let either = or(vec![eq("id", json!(99)), eq("name", json!("a"))]);
        assert!(either(&r));
        let neither = and(vec![eq("id", json!(99)), eq("name", json!("z"))]);
        assert!(!neither(&r));
    }

    #[test]
    fn empty_and_or() {
        let r = row(1, "a");
        assert!(and(vec![])(&r));
        assert!(!or(vec![])(&r));
    }
}
