//! Driver capability consumed by this crate.
//!
//! Everything that actually talks to a database lives behind the traits in
//! this module: [`Driver`] opens connections and constructs DDL queries,
//! [`Query`] runs against a connection and yields either a single document or
//! a [`Cursor`], and [`RawConnection`] is the transport handle a driver hands
//! back. The rest of the crate never sees a wire protocol.
//!
//! A driver is made visible to the process with [`register_driver`], the same
//! way the `log` crate installs its global logger. Operations that need a
//! driver fail with [`Error::DriverUnavailable`] until one is registered.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::{ConnectionOptions, IndexSpec};
use crate::connection::Connection;
use crate::error::{Error, Result};

/// A single document or scalar value, as produced by the database
pub type Document = serde_json::Value;

/// Boxed query trait object
pub type BoxQuery = Box<dyn Query>;

/// Boxed cursor trait object
pub type BoxCursor = Box<dyn Cursor>;

static DRIVER: RwLock<Option<Arc<dyn Driver>>> = RwLock::new(None);

/// Register the process-wide database driver, replacing any previous one.
///
/// # Example
///
/// ```ignore
/// rethink_kit::register_driver(Arc::new(MyDriver::new()));
/// let conn = rethink_kit::connect(&ConnectionOptions::new()).await?;
/// ```
pub fn register_driver(driver: Arc<dyn Driver>) {
    *DRIVER.write() = Some(driver);
}

/// Resolve the registered driver, failing without any I/O when there is none.
pub(crate) fn registered_driver() -> Result<Arc<dyn Driver>> {
    DRIVER.read().clone().ok_or_else(|| {
        Error::DriverUnavailable("no database driver has been registered".to_string())
    })
}

/// A database driver: opens connections and constructs schema queries.
///
/// Query construction is synchronous and performs no I/O; the returned
/// [`BoxQuery`] values only touch the network when run through
/// [`run`](crate::run).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a single connection. Called once per [`connect`](crate::connect)
    /// and once per pool slot; implementations must not retry internally.
    async fn connect(&self, options: &ConnectionOptions) -> Result<Connection>;

    /// Query that creates a database
    fn db_create(&self, name: &str) -> BoxQuery;

    /// Query that drops a database
    fn db_drop(&self, name: &str) -> BoxQuery;

    /// Query that creates a table with the given primary key
    fn table_create(&self, name: &str, primary_key: &str) -> BoxQuery;

    /// Query that drops a table
    fn table_drop(&self, name: &str) -> BoxQuery;

    /// Query that lists the names of all tables in the connected database
    fn table_list(&self) -> BoxQuery;

    /// Query that creates a secondary index on a table
    fn index_create(&self, table: &str, index: &IndexSpec) -> BoxQuery;

    /// Query that deletes every document in a table
    fn delete_all(&self, table: &str) -> BoxQuery;
}

/// An executable query.
///
/// A query is opaque to this crate; its one capability is to run against a
/// connection and produce an [`Outcome`].
#[async_trait]
pub trait Query: Send + Sync {
    /// Execute against the given connection
    async fn run(&self, conn: &Connection) -> Result<Outcome>;
}

#[async_trait]
impl Query for Box<dyn Query> {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        self.as_ref().run(conn).await
    }
}

/// Raw result of a query, before normalization
pub enum Outcome {
    /// A single document or scalar value
    Atom(Document),

    /// A lazy sequence of documents
    Cursor(BoxCursor),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Atom(doc) => f.debug_tuple("Atom").field(doc).finish(),
            Outcome::Cursor(_) => f.debug_tuple("Cursor").finish(),
        }
    }
}

/// A lazy sequence of documents produced by a query.
///
/// Cursors never cross the [`run`](crate::run) boundary; the executor drains
/// them eagerly into an ordered `Vec<Document>`.
#[async_trait]
pub trait Cursor: Send {
    /// Next document, or `None` once the cursor is exhausted
    async fn try_next(&mut self) -> Result<Option<Document>>;
}

/// Transport handle behind a [`Connection`].
#[async_trait]
pub trait RawConnection: Send {
    /// Close the underlying transport
    async fn close(&mut self) -> Result<()>;

    /// Downcast seam for driver-defined query implementations
    fn as_any(&mut self) -> &mut (dyn Any + Send);
}
