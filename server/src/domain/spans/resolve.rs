//! Span body resolution
//!
//! A listing page starts as index stubs. Each stub's body is fetched concurrently and
//! the page is only filled in once every fetch has succeeded.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::model::Span;
use crate::data::{DataError, SpanIndexRepository};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("span {span_id} of trace {trace_id} not found")]
    NotFound { trace_id: String, span_id: String },

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("span resolution cancelled")]
    Cancelled,

    #[error("span resolution task failed: {0}")]
    Task(String),
}

/// Loads one complete span by identity
#[async_trait]
pub trait SpanFetcher: Send + Sync {
    async fn fetch_span(&self, trace_id: &str, span_id: &str) -> Result<Span, ResolveError>;
}

/// Fetches spans from the index repository
pub struct RepositoryFetcher {
    repo: Arc<dyn SpanIndexRepository>,
}

impl RepositoryFetcher {
    pub fn new(repo: Arc<dyn SpanIndexRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl SpanFetcher for RepositoryFetcher {
    async fn fetch_span(&self, trace_id: &str, span_id: &str) -> Result<Span, ResolveError> {
        self.repo
            .select_span(trace_id, span_id)
            .await?
            .ok_or_else(|| ResolveError::NotFound {
                trace_id: trace_id.to_string(),
                span_id: span_id.to_string(),
            })
    }
}

/// Replace every stub in `spans` with its fetched span, preserving order.
///
/// All-or-nothing: on the first failure the remaining fetches are cancelled, every task
/// is awaited, the first error is returned and `spans` is left untouched.
pub async fn resolve_spans(
    fetcher: Arc<dyn SpanFetcher>,
    spans: &mut [Span],
) -> Result<(), ResolveError> {
    if spans.is_empty() {
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();
    for (idx, stub) in spans.iter().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let cancel = cancel.clone();
        let trace_id = stub.trace_id.clone();
        let span_id = stub.id.clone();
        tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ResolveError::Cancelled),
                result = fetcher.fetch_span(&trace_id, &span_id) => result,
            };
            (idx, result)
        });
    }

    let mut resolved: Vec<Option<Span>> = vec![None; spans.len()];
    let mut first_err: Option<ResolveError> = None;
    while let Some(joined) = tasks.join_next().await {
        let err = match joined {
            Ok((idx, Ok(span))) => {
                resolved[idx] = Some(span);
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) => ResolveError::Task(e.to_string()),
        };
        if first_err.is_none() {
            tracing::debug!(error = %err, "Span resolution failed, cancelling remaining fetches");
            cancel.cancel();
            first_err = Some(err);
        }
    }

    if let Some(err) = first_err {
        return Err(err);
    }

    for (slot, span) in spans.iter_mut().zip(resolved) {
        if let Some(span) = span {
            *slot = span;
        }
    }
    Ok(())
}
