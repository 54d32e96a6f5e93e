//! Span query service
//!
//! Orchestrates one request per endpoint: compile the decoded filter into a plan, run it,
//! then post-process (resolve bodies, gap-fill buckets, coerce wide integers).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

use super::aggregate::{self, BucketRow, PercentileSeries};
use super::bucket::BucketPlanner;
use super::coerce::coerce_map;
use super::filter::SpanFilter;
use super::model::Span;
use super::parts::QueryPart;
use super::query::{IndexSource, QueryBuilder, QueryError, SpanQuery};
use super::resolve::{RepositoryFetcher, ResolveError, SpanFetcher, resolve_spans};
use crate::core::config::QueryConfig;
use crate::data::{DataError, QueryRow, SpanIndexRepository};

#[derive(Debug, thiserror::Error)]
pub enum SpanQueryError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("'column' query param is required")]
    MissingColumn,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpanList {
    pub spans: Vec<Span>,
    /// Total matches, independent of paging
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupColumn {
    pub name: String,
    pub is_num: bool,
    pub is_group: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupList {
    /// One object per group keyed by column name
    #[schema(value_type = Vec<Object>)]
    pub groups: Vec<Map<String, JsonValue>>,
    /// The parts as applied, with unsupported directives marked disabled
    #[schema(value_type = Vec<Object>)]
    pub query_parts: Vec<QueryPart>,
    pub columns: Vec<GroupColumn>,
}

pub struct SpanQueryService {
    repo: Arc<dyn SpanIndexRepository>,
    fetcher: Arc<dyn SpanFetcher>,
    config: QueryConfig,
    planner: BucketPlanner,
}

impl SpanQueryService {
    pub fn new(repo: Arc<dyn SpanIndexRepository>, config: QueryConfig) -> Self {
        let fetcher = Arc::new(RepositoryFetcher::new(Arc::clone(&repo)));
        Self::with_fetcher(repo, fetcher, config)
    }

    pub fn with_fetcher(
        repo: Arc<dyn SpanIndexRepository>,
        fetcher: Arc<dyn SpanFetcher>,
        config: QueryConfig,
    ) -> Self {
        Self {
            repo,
            fetcher,
            planner: BucketPlanner::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// One page of fully resolved spans plus the total match count
    pub async fn list_spans(&self, filter: &SpanFilter) -> Result<SpanList, SpanQueryError> {
        let query = QueryBuilder::new(filter).span_page()?;
        let (rows, count) = tokio::try_join!(self.repo.select(&query), self.repo.count(&query))?;

        let mut spans: Vec<Span> = rows
            .iter()
            .filter_map(|row| {
                let trace_id = row.cell(0).as_str()?;
                let id = row.cell(1).as_str()?;
                Some(Span::stub(trace_id, id))
            })
            .collect();
        resolve_spans(Arc::clone(&self.fetcher), &mut spans).await?;

        tracing::debug!(spans = spans.len(), count, "Listed spans");
        Ok(SpanList { spans, count })
    }

    /// Grouped aggregates, served from the rollup when it can answer the request
    pub async fn list_groups(&self, filter: &SpanFilter) -> Result<GroupList, SpanQueryError> {
        let query = self.groups_query(filter)?;
        let rows = self.repo.select(&query).await?;

        let groups = rows.iter().map(|row| group_row(&query, row)).collect();
        let columns = query
            .columns
            .iter()
            .map(|c| GroupColumn {
                name: c.alias.clone(),
                is_num: c.value_type().is_num(),
                is_group: c.is_group,
            })
            .collect();

        Ok(GroupList {
            groups,
            query_parts: filter.parts.clone(),
            columns,
        })
    }

    fn groups_query(&self, filter: &SpanFilter) -> Result<SpanQuery, QueryError> {
        let builder = QueryBuilder::new(filter);
        let limit = self.config.groups_limit;
        if !self.config.fast_groups {
            return builder.groups(IndexSource::Spans, limit);
        }
        match builder.groups(IndexSource::SpanMinutes, limit) {
            Ok(query) => Ok(query),
            Err(QueryError::NotInRollup(what)) => {
                tracing::debug!(%what, "Rollup cannot serve groups, using raw spans");
                builder.groups(IndexSource::Spans, limit)
            }
            Err(e) => Err(e),
        }
    }

    /// Count, rates and duration percentiles per bucket
    pub async fn percentiles(
        &self,
        filter: &SpanFilter,
    ) -> Result<PercentileSeries, SpanQueryError> {
        let plan = self.planner.plan(filter.time_gte, filter.time_lt);
        if plan.is_empty() {
            return Ok(aggregate::percentile_series(&plan, Vec::new()));
        }

        let query = QueryBuilder::new(filter).percentiles(&plan, self.config.max_points)?;
        let rows = self.repo.select(&query).await?;
        let buckets = rows.iter().filter_map(|row| {
            Some(BucketRow {
                time: row.cell(0).as_time()?,
                count: row.cell(1).as_u64().unwrap_or(0),
                error_count: row.cell(2).as_u64().unwrap_or(0),
                quantiles: [
                    row.cell(3).as_f64(),
                    row.cell(4).as_f64(),
                    row.cell(5).as_f64(),
                ],
            })
        });
        Ok(aggregate::percentile_series(&plan, buckets))
    }

    /// A single aggregate per bucket
    pub async fn stats(&self, filter: &SpanFilter) -> Result<Map<String, JsonValue>, SpanQueryError> {
        let column = filter.column.as_ref().ok_or(SpanQueryError::MissingColumn)?;
        let plan = self.planner.plan(filter.time_gte, filter.time_lt);
        let name = column.to_string();
        if plan.is_empty() {
            return Ok(aggregate::column_series(&plan, &name, Vec::new()));
        }

        let query = QueryBuilder::new(filter).column_series(&plan, column, self.config.max_points)?;
        let rows = self.repo.select(&query).await?;
        let points = rows
            .iter()
            .filter_map(|row| Some((row.cell(0).as_time()?, row.cell(1).to_json())));

        let mut series = aggregate::column_series(&plan, &name, points);
        coerce_map(&mut series);
        Ok(series)
    }
}

fn group_row(query: &SpanQuery, row: &QueryRow) -> Map<String, JsonValue> {
    let mut out: Map<String, JsonValue> = query
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.alias.clone(), row.cell(idx).to_json()))
        .collect();
    coerce_map(&mut out);
    out
}
