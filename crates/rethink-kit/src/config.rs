//! Configuration types for connections, pools and schema setup

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host used when none is configured
pub const DEFAULT_HOST: &str = "localhost";

/// Client driver port used when none is configured
pub const DEFAULT_PORT: u16 = 28015;

/// Database used when none is configured
pub const DEFAULT_DATABASE: &str = "test";

/// Primary key used for tables that do not configure one
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Options for opening a connection to the database
///
/// All fields have defaults (`localhost:28015`, database `test`). The database
/// is kept optional so that [`create_pool`](crate::create_pool) can detect a
/// configuration that never named one; consumers that want the default apply
/// it through [`database_or_default`](ConnectionOptions::database_or_default).
///
/// # Example
///
/// ```
/// use rethink_kit::ConnectionOptions;
///
/// let options = ConnectionOptions::new()
///     .host("db.internal")
///     .port(28016)
///     .database("app");
/// assert_eq!(options.database_or_default(), "app");
/// assert_eq!(ConnectionOptions::new().database_or_default(), "test");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Hostname of the server
    #[serde(default = "default_host")]
    pub host: String,

    /// Client driver port of the server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Target database, if one was configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: None,
        }
    }
}

impl ConnectionOptions {
    /// Create options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the client driver port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the target database
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// The configured database, or `"test"` when none was set
    pub fn database_or_default(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }
}

/// Sizing options for a connection pool
///
/// Defaults: at most 10 connections, a floor of 2 kept warm, and eviction of
/// connections idle for 30 seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of concurrently outstanding connections
    pub max: usize,

    /// Number of connections kept open even when idle
    pub min: usize,

    /// Idle duration after which a connection above the floor is closed
    pub idle_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max: 10,
            min: 2,
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Declarative shape of a single table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Primary key of the table; `"id"` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Optional secondary index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSpec>,
}

impl TableConfig {
    /// The configured primary key, or `"id"` when none was set
    pub fn primary_key(&self) -> &str {
        self.primary_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    /// Set the primary key
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    /// Set the secondary index
    pub fn with_index(mut self, index: impl Into<IndexSpec>) -> Self {
        self.index = Some(index.into());
        self
    }
}

/// A secondary index description
///
/// Serializes either as a bare index name or as a structured descriptor, so
/// both config shapes deserialize from the same field:
///
/// ```
/// use rethink_kit::IndexSpec;
///
/// let simple: IndexSpec = serde_json::from_str(r#""owner_id""#).unwrap();
/// assert_eq!(simple.name(), "owner_id");
///
/// let compound: IndexSpec =
///     serde_json::from_str(r#"{"name": "geo", "multi": true, "fields": ["lat", "lon"]}"#)
///         .unwrap();
/// assert_eq!(compound.name(), "geo");
/// assert!(compound.is_multi());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    /// Plain single-field index named after the field
    Simple(String),

    /// Structured descriptor with multi/compound options
    Compound(CompoundIndex),
}

impl IndexSpec {
    /// Name of the index
    pub fn name(&self) -> &str {
        match self {
            IndexSpec::Simple(name) => name,
            IndexSpec::Compound(index) => &index.name,
        }
    }

    /// Whether the index is multi-valued
    pub fn is_multi(&self) -> bool {
        match self {
            IndexSpec::Simple(_) => false,
            IndexSpec::Compound(index) => index.multi,
        }
    }

    /// Ordered field expressions of a compound index; empty for plain indexes
    pub fn fields(&self) -> &[String] {
        match self {
            IndexSpec::Simple(_) => &[],
            IndexSpec::Compound(index) => &index.fields,
        }
    }
}

impl From<&str> for IndexSpec {
    fn from(name: &str) -> Self {
        IndexSpec::Simple(name.to_string())
    }
}

impl From<String> for IndexSpec {
    fn from(name: String) -> Self {
        IndexSpec::Simple(name)
    }
}

impl From<CompoundIndex> for IndexSpec {
    fn from(index: CompoundIndex) -> Self {
        IndexSpec::Compound(index)
    }
}

/// Structured secondary-index descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundIndex {
    /// Name of the index
    pub name: String,

    /// Whether the index is multi-valued
    #[serde(default)]
    pub multi: bool,

    /// Ordered field expressions forming a compound index; a plain index
    /// when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl CompoundIndex {
    /// Create a plain named descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            multi: false,
            fields: Vec::new(),
        }
    }

    /// Flag the index as multi-valued
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    /// Set the ordered field expressions
    pub fn fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Desired shape of a database, consumed by [`setup`](crate::setup)
///
/// Final state, not creation order, is the contract: tables are created as an
/// unordered concurrent batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Where to connect when no connection is supplied to `setup`
    #[serde(flatten)]
    pub connection: ConnectionOptions,

    /// Drop the target database before creating it (best-effort)
    #[serde(default)]
    pub force: bool,

    /// Tables the database should contain
    #[serde(default)]
    pub tables: HashMap<String, TableConfig>,
}

impl SetupConfig {
    /// Create a config targeting the given database on the default host
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            connection: ConnectionOptions::new().database(database),
            ..Self::default()
        }
    }

    /// Drop the database first
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Add a table to the desired shape
    pub fn table(mut self, name: impl Into<String>, config: TableConfig) -> Self {
        self.tables.insert(name.into(), config);
        self
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
