//! Response shaping
//!
//! Records render as their property map plus the reserved `__` fields:
//! `__id`, `__published`, `__updated` and a `__metadata` block carrying the
//! weak ETag and the entity type name. Expanded children embed as arrays
//! under `_<EntityType>` keys.

use serde_json::{json, Map, Value};

use crate::query::{ExpandedRecord, QueryOutcome};
use crate::store::UserData;

fn record_map(record: &UserData) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("__id".into(), Value::String(record.id.clone()));
    out.insert("__published".into(), json!(record.metadata.published));
    out.insert("__updated".into(), json!(record.metadata.updated));
    out.insert(
        "__metadata".into(),
        json!({
            "etag": record.etag().to_string(),
            "type": record.entity_type,
        }),
    );
    for (key, value) in &record.properties {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Render one record as a response object
pub fn render_record(record: &UserData) -> Value {
    Value::Object(record_map(record))
}

/// Render a record with its expanded children
pub fn render_expanded(expanded: &ExpandedRecord) -> Value {
    let mut out = record_map(&expanded.record);
    for (target, children) in &expanded.expanded {
        let rendered: Vec<Value> = children.iter().map(render_record).collect();
        out.insert(format!("_{target}"), Value::Array(rendered));
    }
    Value::Object(out)
}

/// Render a list outcome, with `__count` under `$inlinecount=allpages`
pub fn render_list(outcome: &QueryOutcome) -> Value {
    let results: Vec<Value> = outcome.results.iter().map(render_expanded).collect();
    let mut out = Map::new();
    if let Some(count) = outcome.count {
        out.insert("__count".into(), json!(count));
    }
    out.insert("results".into(), Value::Array(results));
    Value::Object(out)
}

/// Render a links listing as target ids
pub fn render_links(ids: &[String]) -> Value {
    let results: Vec<Value> = ids.iter().map(|id| json!({ "__id": id })).collect();
    json!({ "results": results })
}
