//! `$orderby` parsing and stable record ordering

use std::cmp::Ordering;

use serde_json::Value;

use super::errors::{QueryError, QueryResult};
use crate::schema::SchemaRegistry;
use crate::store::UserData;

/// One `$orderby` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub property: String,
    pub descending: bool,
}

impl OrderKey {
    /// Parse a comma-separated `$orderby` value into keys
    pub fn parse_list(raw: &str) -> QueryResult<Vec<OrderKey>> {
        let mut keys = Vec::new();
        for part in raw.split(',') {
            let mut words = part.split_whitespace();
            let property = words
                .next()
                .ok_or_else(|| QueryError::parse("$orderby", raw))?
                .to_string();
            let descending = match words.next() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(_) => return Err(QueryError::parse("$orderby", raw)),
            };
            if words.next().is_some() {
                return Err(QueryError::parse("$orderby", raw));
            }
            keys.push(OrderKey {
                property,
                descending,
            });
        }
        Ok(keys)
    }

    /// Fail with the first key that does not resolve on the entity type
    pub fn validate(
        keys: &[OrderKey],
        entity_type: &str,
        registry: &SchemaRegistry,
    ) -> QueryResult<()> {
        for key in keys {
            if !key.property.starts_with("__")
                && registry.resolve_property(entity_type, &key.property).is_none()
            {
                return Err(QueryError::UnknownKey(key.property.clone()));
            }
        }
        Ok(())
    }
}

/// Sort records by the given keys, keeping insertion order among ties
pub fn sort_records(records: &mut [UserData], keys: &[OrderKey]) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for key in keys {
            let va = a.properties.get(&key.property).unwrap_or(&Value::Null);
            let vb = b.properties.get(&key.property).unwrap_or(&Value::Null);
            let ord = compare_values(va, vb);
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Total order over JSON scalars: null < booleans < numbers < strings.
///
/// Composite values sort as equals so they fall back to insertion order.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
