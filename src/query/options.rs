//! Query option parsing and validation
//!
//! Every option is validated before execution begins; the first failure
//! short-circuits with no partial result. `$top` has two ceilings: the
//! stricter one applies once `$expand` is present.

use std::collections::HashMap;

use super::errors::{QueryError, QueryResult};
use super::filter::FilterExpr;
use super::sorter::OrderKey;
use crate::config::EngineConfig;
use crate::schema::SchemaRegistry;

const KNOWN_OPTIONS: [&str; 6] = [
    "$top",
    "$skip",
    "$filter",
    "$orderby",
    "$expand",
    "$inlinecount",
];

/// `$inlinecount` mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InlineCount {
    /// Include the total matching count as `__count`
    AllPages,
    /// No count in the response
    #[default]
    None,
}

/// Validated query options for a list request
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub top: Option<usize>,
    pub skip: usize,
    pub filter: Option<FilterExpr>,
    pub orderby: Vec<OrderKey>,
    /// Target entity type names from `$expand`, in declaration order
    pub expand: Vec<String>,
    pub inlinecount: InlineCount,
}

impl QueryOptions {
    /// Parse and validate raw query parameters against the schema.
    ///
    /// `entity_type` is the base type of the request and must exist in the
    /// registry.
    pub fn parse(
        params: &HashMap<String, String>,
        entity_type: &str,
        registry: &SchemaRegistry,
        config: &EngineConfig,
    ) -> QueryResult<Self> {
        for key in params.keys() {
            if key.starts_with('$') && !KNOWN_OPTIONS.contains(&key.as_str()) {
                return Err(QueryError::parse(key.clone(), params[key].clone()));
            }
        }

        let expand = match params.get("$expand") {
            Some(raw) => parse_expand(raw, entity_type, registry, config.expand_max_for_list)?,
            None => Vec::new(),
        };

        let top_max = if expand.is_empty() {
            config.top_max
        } else {
            config.top_max_with_expand
        };
        let top = match params.get("$top") {
            Some(raw) => Some(parse_bounded("$top", raw, top_max)? as usize),
            None => None,
        };
        let skip = match params.get("$skip") {
            Some(raw) => parse_bounded("$skip", raw, config.skip_max)? as usize,
            None => 0,
        };

        registry
            .entity_type(entity_type)
            .map_err(|_| QueryError::UnknownKey(entity_type.to_string()))?;

        let filter = match params.get("$filter") {
            Some(raw) => {
                let expr = FilterExpr::parse(raw)?;
                expr.validate(entity_type, registry)?;
                Some(expr)
            }
            None => None,
        };

        let orderby = match params.get("$orderby") {
            Some(raw) => {
                let keys = OrderKey::parse_list(raw)?;
                OrderKey::validate(&keys, entity_type, registry)?;
                keys
            }
            None => Vec::new(),
        };

        let inlinecount = match params.get("$inlinecount").map(String::as_str) {
            Some("allpages") => InlineCount::AllPages,
            Some("none") | None => InlineCount::None,
            Some(other) => return Err(QueryError::parse("$inlinecount", other)),
        };

        Ok(Self {
            top,
            skip,
            filter,
            orderby,
            expand,
            inlinecount,
        })
    }
}

/// Parse a `$expand` value into target entity type names.
///
/// Each segment is a navigation property `_<EntityType>` that must resolve
/// to a declared association from the base type. The segment count is
/// checked against `max` before any resolution.
pub fn parse_expand(
    raw: &str,
    entity_type: &str,
    registry: &SchemaRegistry,
    max: usize,
) -> QueryResult<Vec<String>> {
    let segments: Vec<&str> = raw.split(',').map(str::trim).collect();
    if segments.len() > max {
        return Err(QueryError::ExpandLimitExceeded {
            count: segments.len(),
            max,
        });
    }
    let mut targets = Vec::with_capacity(segments.len());
    for segment in segments {
        let target = segment
            .strip_prefix('_')
            .filter(|t| !t.is_empty())
            .ok_or_else(|| QueryError::parse("$expand", raw))?;
        if registry.resolve_association(entity_type, target).is_err() {
            return Err(QueryError::UnknownKey(segment.to_string()));
        }
        targets.push(target.to_string());
    }
    Ok(targets)
}

/// Integer in `0..=max`; a malformed literal and an out-of-range value fail
/// with different kinds
fn parse_bounded(param: &str, raw: &str, max: i64) -> QueryResult<i64> {
    let value = raw
        .parse::<i64>()
        .map_err(|_| QueryError::parse(param, raw))?;
    if value < 0 || value > max {
        return Err(QueryError::invalid(param, raw));
    }
    Ok(value)
}
