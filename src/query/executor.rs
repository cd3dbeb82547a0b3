//! Query execution pipeline
//!
//! Filter, sort, count, window, then expand. The count reflects the filtered
//! set before `$skip`/`$top` windowing. Input records arrive in insertion
//! order and keep it unless `$orderby` reorders them, so a window is
//! deterministic across identical requests.

use super::options::{InlineCount, QueryOptions};
use super::sorter::sort_records;
use crate::store::{EntityStore, UserData};

/// One result record with its `$expand` children
#[derive(Debug, Clone)]
pub struct ExpandedRecord {
    pub record: UserData,
    /// `(target entity type, children)` in `$expand` declaration order
    pub expanded: Vec<(String, Vec<UserData>)>,
}

/// The outcome of a list query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub results: Vec<ExpandedRecord>,
    /// Total filtered count, present under `$inlinecount=allpages`
    pub count: Option<usize>,
}

/// Run validated options over a record set
pub fn execute(
    records: Vec<UserData>,
    options: &QueryOptions,
    store: &dyn EntityStore,
) -> QueryOutcome {
    let mut matched: Vec<UserData> = match &options.filter {
        Some(expr) => records
            .into_iter()
            .filter(|r| expr.matches(&r.properties))
            .collect(),
        None => records,
    };

    sort_records(&mut matched, &options.orderby);

    let count = match options.inlinecount {
        InlineCount::AllPages => Some(matched.len()),
        InlineCount::None => None,
    };

    let windowed: Vec<UserData> = match options.top {
        Some(top) => matched.into_iter().skip(options.skip).take(top).collect(),
        None => matched.into_iter().skip(options.skip).collect(),
    };

    let results = windowed
        .into_iter()
        .map(|record| {
            let expanded = options
                .expand
                .iter()
                .map(|target| {
                    let children = store
                        .list_links(&record.entity_type, &record.id, target)
                        .into_iter()
                        .filter_map(|id| store.get(target, &id).ok())
                        .collect();
                    (target.clone(), children)
                })
                .collect();
            ExpandedRecord { record, expanded }
        })
        .collect();

    QueryOutcome { results, count }
}
