//! Schema versioning
//!
//! A fresh database gets the full `SCHEMA` at `SCHEMA_VERSION`. Existing databases replay
//! every entry of `MIGRATIONS` newer than their stored version, one transaction each.

use duckdb::{Connection, OptionalExt};

use super::error::DuckdbError;
use super::in_transaction;
use super::schema::{SCHEMA, SCHEMA_VERSION};

/// One forward-only schema change
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Changes after the initial schema, ascending by version
const MIGRATIONS: &[Migration] = &[];

/// Create or upgrade the schema
pub fn run_migrations(conn: &Connection) -> Result<(), DuckdbError> {
    let Some(current) = stored_version(conn)? else {
        tracing::debug!(version = SCHEMA_VERSION, "Creating database schema");
        return apply_initial_schema(conn);
    };

    if current > SCHEMA_VERSION {
        return Err(DuckdbError::MigrationFailed {
            version: current,
            name: "version_check".to_string(),
            error: format!(
                "database schema version {} is newer than this build ({}); upgrade the server",
                current, SCHEMA_VERSION
            ),
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        tracing::debug!(version = current, "Database schema is up to date");
        return Ok(());
    }
    for migration in pending {
        apply_migration(conn, migration)?;
    }
    Ok(())
}

/// `None` on a database that has never been initialized
fn stored_version(conn: &Connection) -> Result<Option<i32>, DuckdbError> {
    let has_table: bool = conn.query_row(
        "SELECT count(*) > 0 FROM information_schema.tables WHERE table_name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }
    let version = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(Some(version.unwrap_or(0)))
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), DuckdbError> {
    let now = chrono::Utc::now().timestamp_micros();
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, applied_at, description) \
         VALUES (1, ?, ?, ?)",
        duckdb::params![version, now, description],
    )?;
    Ok(())
}

fn apply_initial_schema(conn: &Connection) -> Result<(), DuckdbError> {
    let start = std::time::Instant::now();
    in_transaction(conn, |conn| {
        conn.execute_batch(SCHEMA)?;
        record_version(conn, SCHEMA_VERSION, "initial schema")
    })?;
    tracing::debug!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Applied initial schema"
    );
    Ok(())
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<(), DuckdbError> {
    let start = std::time::Instant::now();
    in_transaction(conn, |conn| {
        conn.execute_batch(migration.sql)
            .map_err(|e| DuckdbError::MigrationFailed {
                version: migration.version,
                name: migration.name.to_string(),
                error: e.to_string(),
            })?;
        record_version(conn, migration.version, migration.name)
    })?;
    tracing::info!(
        version = migration.version,
        name = migration.name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Applied migration"
    );
    Ok(())
}
