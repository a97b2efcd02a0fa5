//! Idempotent schema bootstrap and teardown helpers
//!
//! `setup` converges a database toward a declarative [`SetupConfig`] and
//! `clear` empties a set of tables. Both are best-effort by contract: steps
//! that collide with existing state (database or table already present,
//! table already gone) are logged and swallowed, so either helper can be
//! re-run safely and still reports success.

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::config::{SetupConfig, TableConfig};
use crate::connection::{connect, Connection};
use crate::driver::{registered_driver, Driver};
use crate::error::Result;
use crate::executor::run;

/// Bring the target database to the shape described by `config`.
///
/// When no connection is supplied, one is opened from `config.connection`
/// (and that acquisition failure propagates). With `force` set, the database
/// is dropped first, best-effort. The database is then created, best-effort,
/// and every configured table is created as an unordered concurrent batch:
/// each table's secondary index is created after that table's own creation,
/// with no ordering relative to other tables. Every best-effort failure is
/// logged at debug level and swallowed, so re-running `setup` against an
/// existing schema still returns `Ok(true)`.
///
/// # Example
///
/// ```ignore
/// let config = SetupConfig::new("app")
///     .table("users", TableConfig::default())
///     .table("posts", TableConfig::default().with_index("author_id"));
/// rethink_kit::setup(&config, None).await?;
/// ```
pub async fn setup(config: &SetupConfig, conn: Option<&Connection>) -> Result<bool> {
    let driver = registered_driver()?;

    let owned;
    let conn = match conn {
        Some(conn) => conn,
        None => {
            owned = connect(&config.connection).await?;
            &owned
        }
    };

    let database = config.connection.database_or_default();

    if config.force {
        if let Err(err) = run(&driver.db_drop(database), conn).await {
            debug!(%database, error = %err, "ignoring failure to drop database");
        }
    }

    if let Err(err) = run(&driver.db_create(database), conn).await {
        debug!(%database, error = %err, "ignoring failure to create database");
    }

    let creations = config
        .tables
        .iter()
        .map(|(name, table)| create_table(&driver, conn, name, table));
    join_all(creations).await;

    Ok(true)
}

/// Create one table and, after it, that table's own secondary index.
/// Both steps are individually best-effort.
async fn create_table(driver: &Arc<dyn Driver>, conn: &Connection, name: &str, table: &TableConfig) {
    let create = driver.table_create(name, table.primary_key());
    if let Err(err) = run(&create, conn).await {
        debug!(table = name, error = %err, "ignoring failure to create table");
    }

    if let Some(index) = &table.index {
        let create = driver.index_create(name, index);
        if let Err(err) = run(&create, conn).await {
            debug!(table = name, index = index.name(), error = %err, "ignoring failure to create index");
        }
    }
}

/// Delete every document from the given tables, or from all tables when none
/// are named.
///
/// Listing the tables (when `tables` is `None`) can fail and that failure
/// propagates; individual deletions are best-effort, so missing tables are
/// logged and swallowed and the call still returns `Ok(true)`.
///
/// # Example
///
/// ```ignore
/// // Empty two specific tables
/// rethink_kit::clear(Some(vec!["users".into(), "posts".into()]), &conn).await?;
///
/// // Empty every table in the database
/// rethink_kit::clear(None, &conn).await?;
/// ```
pub async fn clear(tables: Option<Vec<String>>, conn: &Connection) -> Result<bool> {
    let driver = registered_driver()?;

    let tables = match tables {
        Some(tables) => tables,
        None => run(&driver.table_list(), conn)
            .await?
            .deserialize::<Vec<String>>()?,
    };

    let deletions = tables
        .iter()
        .map(|name| clear_table(&driver, conn, name));
    join_all(deletions).await;

    Ok(true)
}

async fn clear_table(driver: &Arc<dyn Driver>, conn: &Connection, name: &str) {
    if let Err(err) = run(&driver.delete_all(name), conn).await {
        debug!(table = name, error = %err, "ignoring failure to clear table");
    }
}
