//! Repository traits for the span index
//!
//! The query service depends only on these traits, so storage backends and test
//! doubles are interchangeable.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::QueryRow;
use crate::domain::spans::model::Span;
use crate::domain::spans::query::SpanQuery;

#[async_trait]
pub trait SpanIndexRepository: Send + Sync {
    /// Execute a plan; cells follow the plan's select list
    async fn select(&self, query: &SpanQuery) -> Result<Vec<QueryRow>, DataError>;

    /// Number of rows matching the plan's conditions, ignoring paging
    async fn count(&self, query: &SpanQuery) -> Result<u64, DataError>;

    /// Index row plus stored body for one span
    async fn select_span(&self, trace_id: &str, span_id: &str) -> Result<Option<Span>, DataError>;

    /// Rebuild the per-minute rollup, returning the number of rollup rows
    async fn refresh_rollup(&self) -> Result<u64, DataError>;
}
