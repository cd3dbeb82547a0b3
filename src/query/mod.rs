//! OData-style query engine
//!
//! Parses and validates `$top`, `$skip`, `$filter`, `$orderby`, `$expand`
//! and `$inlinecount`, then runs the pipeline in [`executor`]. Validation is
//! all-or-nothing: the first bad option fails the request before any record
//! is touched.

pub mod errors;
pub mod executor;
pub mod filter;
pub mod options;
pub mod sorter;

pub use errors::{QueryError, QueryResult};
pub use executor::{execute, ExpandedRecord, QueryOutcome};
pub use filter::{CompareOp, FilterExpr, Literal};
pub use options::{parse_expand, InlineCount, QueryOptions};
pub use sorter::OrderKey;
