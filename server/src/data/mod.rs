//! Data storage layer
//!
//! - `duckdb` - Span index, bodies and per-minute rollup
//! - `traits` - Repository trait the query service depends on
//! - `types` - Backend-neutral result rows
//! - `error` - Unified error type

pub mod duckdb;
pub mod error;
pub mod traits;
pub mod types;

pub use duckdb::DuckdbService;
pub use error::DataError;
pub use traits::SpanIndexRepository;
pub use types::{Cell, QueryRow};
