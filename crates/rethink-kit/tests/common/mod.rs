//! Shared in-memory driver for integration tests.
//!
//! Implements the crate's driver seam against a process-local document store
//! so the suite runs without a live server. Each test works in its own
//! database name, which keeps parallel tests isolated even though the driver
//! registration is process-wide.

#![allow(dead_code)]

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use rethink_kit::{
    BoxQuery, Connection, ConnectionOptions, Cursor, Document, Driver, Error, IndexSpec, Outcome,
    Query, RawConnection, Result,
};

/// Register the shared in-memory driver once per process and return it.
pub fn driver() -> Arc<MemoryDriver> {
    static DRIVER: OnceLock<Arc<MemoryDriver>> = OnceLock::new();
    DRIVER
        .get_or_init(|| {
            let _ = tracing_subscriber::fmt().with_test_writer().try_init();
            let driver = Arc::new(MemoryDriver::default());
            rethink_kit::register_driver(driver.clone());
            driver
        })
        .clone()
}

/// A database name no other test uses
pub fn unique_db(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!("{}_{}", prefix, COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Open a connection bound to the given database
pub async fn connect_to(database: &str) -> Connection {
    driver();
    rethink_kit::connect(&ConnectionOptions::new().database(database))
        .await
        .expect("memory driver should always connect")
}

/// Host name the memory driver refuses to connect to
pub const UNREACHABLE_HOST: &str = "unreachable.invalid";

#[derive(Default)]
pub struct MemoryDriver {
    server: Arc<MemoryServer>,
}

impl MemoryDriver {
    /// Connections opened since process start
    pub fn connects(&self) -> usize {
        self.server.connects.load(Ordering::SeqCst)
    }

    /// Connections currently open (not yet closed or dropped)
    pub fn open_connections(&self) -> usize {
        self.server.open.load(Ordering::SeqCst)
    }

    pub fn has_table(&self, database: &str, table: &str) -> bool {
        self.server
            .databases
            .lock()
            .get(database)
            .map(|db| db.tables.contains_key(table))
            .unwrap_or(false)
    }

    pub fn row_count(&self, database: &str, table: &str) -> Option<usize> {
        self.server
            .databases
            .lock()
            .get(database)
            .and_then(|db| db.tables.get(table))
            .map(|table| table.rows.len())
    }

    pub fn index_spec(&self, database: &str, table: &str, index: &str) -> Option<IndexSpec> {
        self.server
            .databases
            .lock()
            .get(database)
            .and_then(|db| db.tables.get(table))
            .and_then(|table| table.indexes.get(index))
            .cloned()
    }
}

#[derive(Default)]
struct MemoryServer {
    databases: Mutex<HashMap<String, MemoryDatabase>>,
    connects: AtomicUsize,
    open: AtomicUsize,
}

#[derive(Default)]
struct MemoryDatabase {
    tables: HashMap<String, MemoryTable>,
}

struct MemoryTable {
    primary_key: String,
    indexes: HashMap<String, IndexSpec>,
    rows: Vec<Document>,
}

struct MemoryConnection {
    server: Arc<MemoryServer>,
    database: String,
    closed: bool,
}

impl MemoryConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.server.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RawConnection for MemoryConnection {
    async fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }

    fn as_any(&mut self) -> &mut (dyn Any + Send) {
        self
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(&self, options: &ConnectionOptions) -> Result<Connection> {
        if options.host == UNREACHABLE_HOST {
            return Err(Error::Connection(format!(
                "cannot reach `{}:{}`",
                options.host, options.port
            )));
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        self.server.open.fetch_add(1, Ordering::SeqCst);
        Ok(Connection::new(Box::new(MemoryConnection {
            server: self.server.clone(),
            database: options.database_or_default().to_string(),
            closed: false,
        })))
    }

    fn db_create(&self, name: &str) -> BoxQuery {
        Box::new(DbCreate(name.to_string()))
    }

    fn db_drop(&self, name: &str) -> BoxQuery {
        Box::new(DbDrop(name.to_string()))
    }

    fn table_create(&self, name: &str, primary_key: &str) -> BoxQuery {
        Box::new(TableCreate {
            name: name.to_string(),
            primary_key: primary_key.to_string(),
        })
    }

    fn table_drop(&self, name: &str) -> BoxQuery {
        Box::new(TableDrop(name.to_string()))
    }

    fn table_list(&self) -> BoxQuery {
        Box::new(TableList)
    }

    fn index_create(&self, table: &str, index: &IndexSpec) -> BoxQuery {
        Box::new(IndexCreate {
            table: table.to_string(),
            index: index.clone(),
        })
    }

    fn delete_all(&self, table: &str) -> BoxQuery {
        Box::new(DeleteAll(table.to_string()))
    }
}

/// Run a closure against the memory state behind a connection
async fn with_conn<T>(
    conn: &Connection,
    f: impl FnOnce(&mut MemoryConnection) -> Result<T> + Send,
) -> Result<T> {
    let mut raw = conn.raw().await;
    let mem = raw
        .as_any()
        .downcast_mut::<MemoryConnection>()
        .ok_or_else(|| Error::Query("connection does not belong to the memory driver".to_string()))?;
    f(mem)
}

struct DbCreate(String);

#[async_trait]
impl Query for DbCreate {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            if dbs.contains_key(&self.0) {
                return Err(Error::Query(format!("Database `{}` already exists", self.0)));
            }
            dbs.insert(self.0.clone(), MemoryDatabase::default());
            Ok(Outcome::Atom(json!({ "dbs_created": 1 })))
        })
        .await
    }
}

struct DbDrop(String);

#[async_trait]
impl Query for DbDrop {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            if dbs.remove(&self.0).is_none() {
                return Err(Error::Query(format!("Database `{}` does not exist", self.0)));
            }
            Ok(Outcome::Atom(json!({ "dbs_dropped": 1 })))
        })
        .await
    }
}

struct TableCreate {
    name: String,
    primary_key: String,
}

#[async_trait]
impl Query for TableCreate {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            let db = dbs
                .get_mut(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            if db.tables.contains_key(&self.name) {
                return Err(Error::Query(format!("Table `{}` already exists", self.name)));
            }
            db.tables.insert(
                self.name.clone(),
                MemoryTable {
                    primary_key: self.primary_key.clone(),
                    indexes: HashMap::new(),
                    rows: Vec::new(),
                },
            );
            Ok(Outcome::Atom(json!({ "tables_created": 1 })))
        })
        .await
    }
}

struct TableDrop(String);

#[async_trait]
impl Query for TableDrop {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            let db = dbs
                .get_mut(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            if db.tables.remove(&self.0).is_none() {
                return Err(Error::Query(format!("Table `{}` does not exist", self.0)));
            }
            Ok(Outcome::Atom(json!({ "tables_dropped": 1 })))
        })
        .await
    }
}

struct TableList;

#[async_trait]
impl Query for TableList {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let dbs = mem.server.databases.lock();
            let db = dbs
                .get(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let mut names: Vec<&String> = db.tables.keys().collect();
            names.sort();
            Ok(Outcome::Atom(json!(names)))
        })
        .await
    }
}

struct IndexCreate {
    table: String,
    index: IndexSpec,
}

#[async_trait]
impl Query for IndexCreate {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            let db = dbs
                .get_mut(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let table = db
                .tables
                .get_mut(&self.table)
                .ok_or_else(|| Error::Query(format!("Table `{}` does not exist", self.table)))?;
            let name = self.index.name().to_string();
            if table.indexes.contains_key(&name) {
                return Err(Error::Query(format!("Index `{}` already exists", name)));
            }
            table.indexes.insert(name, self.index.clone());
            Ok(Outcome::Atom(json!({ "created": 1 })))
        })
        .await
    }
}

struct DeleteAll(String);

#[async_trait]
impl Query for DeleteAll {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            let db = dbs
                .get_mut(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let table = db
                .tables
                .get_mut(&self.0)
                .ok_or_else(|| Error::Query(format!("Table `{}` does not exist", self.0)))?;
            let deleted = table.rows.len();
            table.rows.clear();
            Ok(Outcome::Atom(json!({ "deleted": deleted })))
        })
        .await
    }
}

/// Insert one document (test-side equivalent of `r.table(x).insert(doc)`)
pub struct Insert {
    pub table: String,
    pub document: Document,
}

impl Insert {
    pub fn new(table: impl Into<String>, document: Document) -> Self {
        Self {
            table: table.into(),
            document,
        }
    }
}

#[async_trait]
impl Query for Insert {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let mut dbs = mem.server.databases.lock();
            let db = dbs
                .get_mut(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let table = db
                .tables
                .get_mut(&self.table)
                .ok_or_else(|| Error::Query(format!("Table `{}` does not exist", self.table)))?;
            table.rows.push(self.document.clone());
            Ok(Outcome::Atom(json!({ "inserted": 1 })))
        })
        .await
    }
}

/// Fetch one document by primary key (equivalent of `r.table(x).get(key)`)
pub struct Get {
    pub table: String,
    pub key: Document,
}

impl Get {
    pub fn new(table: impl Into<String>, key: Document) -> Self {
        Self {
            table: table.into(),
            key,
        }
    }
}

#[async_trait]
impl Query for Get {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let dbs = mem.server.databases.lock();
            let db = dbs
                .get(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let table = db
                .tables
                .get(&self.table)
                .ok_or_else(|| Error::Query(format!("Table `{}` does not exist", self.table)))?;
            let found = table
                .rows
                .iter()
                .find(|row| row.get(&table.primary_key) == Some(&self.key));
            Ok(Outcome::Atom(found.cloned().unwrap_or(Document::Null)))
        })
        .await
    }
}

/// Full table scan returning a cursor (equivalent of a bare `r.table(x)`)
pub struct Scan {
    pub table: String,
}

impl Scan {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

#[async_trait]
impl Query for Scan {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let dbs = mem.server.databases.lock();
            let db = dbs
                .get(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let table = db
                .tables
                .get(&self.table)
                .ok_or_else(|| Error::Query(format!("Table `{}` does not exist", self.table)))?;
            Ok(Outcome::Cursor(Box::new(MemoryCursor {
                rows: table.rows.iter().cloned().collect(),
                fail_after: None,
                yielded: 0,
            })))
        })
        .await
    }
}

/// Table introspection (equivalent of `r.table(x).info()`)
pub struct Info {
    pub table: String,
}

impl Info {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

#[async_trait]
impl Query for Info {
    async fn run(&self, conn: &Connection) -> Result<Outcome> {
        with_conn(conn, |mem| {
            let dbs = mem.server.databases.lock();
            let db = dbs
                .get(&mem.database)
                .ok_or_else(|| Error::Query(format!("Database `{}` does not exist", mem.database)))?;
            let table = db
                .tables
                .get(&self.table)
                .ok_or_else(|| Error::Query(format!("Table `{}` does not exist", self.table)))?;
            let mut indexes: Vec<&String> = table.indexes.keys().collect();
            indexes.sort();
            Ok(Outcome::Atom(json!({
                "name": self.table,
                "primary_key": table.primary_key,
                "indexes": indexes,
            })))
        })
        .await
    }
}

/// A query that always fails at execution time
pub struct Failing;

#[async_trait]
impl Query for Failing {
    async fn run(&self, _conn: &Connection) -> Result<Outcome> {
        Err(Error::Query("injected failure".to_string()))
    }
}

/// A query whose cursor fails after yielding `yield_count` documents
pub struct BrokenCursor {
    pub yield_count: usize,
}

#[async_trait]
impl Query for BrokenCursor {
    async fn run(&self, _conn: &Connection) -> Result<Outcome> {
        let rows = (0..self.yield_count + 1)
            .map(|i| json!({ "seq": i }))
            .collect();
        Ok(Outcome::Cursor(Box::new(MemoryCursor {
            rows,
            fail_after: Some(self.yield_count),
            yielded: 0,
        })))
    }
}

struct MemoryCursor {
    rows: VecDeque<Document>,
    fail_after: Option<usize>,
    yielded: usize,
}

#[async_trait]
impl Cursor for MemoryCursor {
    async fn try_next(&mut self) -> Result<Option<Document>> {
        if let Some(limit) = self.fail_after {
            if self.yielded >= limit {
                return Err(Error::Query("cursor interrupted".to_string()));
            }
        }
        match self.rows.pop_front() {
            Some(doc) => {
                self.yielded += 1;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }
}
