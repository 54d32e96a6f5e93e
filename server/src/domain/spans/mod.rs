//! Span querying
//!
//! - `filter` - request parameter decoding
//! - `parts` - where/group/column directives
//! - `query` - plan building over raw spans or the per-minute rollup
//! - `bucket` - adaptive time bucketing
//! - `aggregate` - gap-filled count, rate and percentile series
//! - `resolve` - concurrent span body resolution
//! - `coerce` - wide integer coercion for JSON
//! - `service` - endpoint orchestration

pub mod aggregate;
pub mod bucket;
pub mod coerce;
pub mod filter;
pub mod model;
pub mod parts;
pub mod query;
pub mod resolve;
pub mod service;

pub use filter::{DecodeMode, SpanFilter, SpanFilterParams, ValidationError};
pub use model::Span;
pub use query::QueryError;
pub use resolve::ResolveError;
pub use service::{SpanQueryError, SpanQueryService};
