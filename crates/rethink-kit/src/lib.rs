//! Connection, pooling and schema bootstrap helpers for RethinkDB-style
//! document databases.
//!
//! This crate is a thin convenience layer over a database driver: it opens
//! connections (singly or through a bounded pool), normalizes query results
//! (cursors are drained eagerly, scalars pass through), and converges a
//! database toward a declarative schema. The driver itself — wire protocol,
//! query builder — is consumed through the trait seam in [`driver`] and
//! registered once per process.
//!
//! # Features
//!
//! - **Async/await API** - Built on tokio
//! - **Normalized results** - Cursors never escape [`run`]; results
//!   deserialize into Rust types using serde
//! - **Connection pooling** - Bounded `deadpool`-backed pool with min/max
//!   sizing, idle eviction and guaranteed release
//! - **Idempotent schema setup** - `setup` and `clear` converge to the
//!   desired state and can be re-run safely
//!
//! # Quick Start
//!
//! ```ignore
//! use rethink_kit::{ConnectionOptions, PoolOptions, SetupConfig, TableConfig};
//!
//! // Install a driver once at startup
//! rethink_kit::register_driver(std::sync::Arc::new(my_driver));
//!
//! // Ensure the schema exists
//! let config = SetupConfig::new("app")
//!     .table("users", TableConfig::default())
//!     .table("posts", TableConfig::default().with_index("author_id"));
//! rethink_kit::setup(&config, None).await?;
//!
//! // Run queries through a pool
//! let pool = rethink_kit::create_pool(
//!     ConnectionOptions::new().database("app"),
//!     PoolOptions::default(),
//! )?;
//! let users: Vec<User> = rethink_kit::run(&query, &pool).await?.deserialize()?;
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod executor;
pub mod pool;
pub mod setup;

pub use config::{
    CompoundIndex, ConnectionOptions, IndexSpec, PoolOptions, SetupConfig, TableConfig,
};
pub use connection::{connect, Connection};
pub use driver::{register_driver, BoxCursor, BoxQuery, Cursor, Document, Driver, Outcome, Query, RawConnection};
pub use error::{Error, Result};
pub use executor::{run, RunResult, Target};
pub use pool::{create_pool, ConnectionManager, Pool, PooledConnection};
pub use setup::{clear, setup};
