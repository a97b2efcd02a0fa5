//! Connection pool built on deadpool
//!
//! The pool owns a bounded set of reusable connections created through the
//! registered driver. Pooled connections are RAII guards: dropping one
//! returns it to the pool, which is what guarantees release on every exit
//! path of a pooled [`run`](crate::run).

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool::managed::{Manager, Metrics, Object, PoolError, RecycleError};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::{ConnectionOptions, PoolOptions};
use crate::connection::Connection;
use crate::driver::{registered_driver, Driver, Query};
use crate::error::{Error, Result};
use crate::executor::{self, RunResult};

/// Pooled connection wrapper.
///
/// Dereferences to [`Connection`]; returned to the pool when dropped.
pub type PooledConnection = Object<ConnectionManager>;

/// Manager for the connection pool.
///
/// Creates connections through the registered driver and accepts returned
/// connections as-is on recycle; broken connections surface on their next
/// use, as they would on a single connection.
pub struct ConnectionManager {
    driver: Arc<dyn Driver>,
    options: ConnectionOptions,
}

#[async_trait]
impl Manager for ConnectionManager {
    type Type = Connection;
    type Error = Error;

    async fn create(&self) -> Result<Connection> {
        self.driver.connect(&self.options).await
    }

    async fn recycle(&self, _conn: &mut Connection, _: &Metrics) -> std::result::Result<(), RecycleError<Error>> {
        Ok(())
    }
}

/// Create a connection pool.
///
/// Fails synchronously, before any I/O, with
/// [`Error::InvalidConfig`] when the connection options never name a
/// database or the sizing is inconsistent, and with
/// [`Error::DriverUnavailable`] when no driver has been registered.
///
/// A maintenance task keeps the pool at its configured floor and evicts
/// connections idle longer than `idle_timeout`; it requires a running tokio
/// runtime and is skipped (with a debug log) when none is current.
///
/// # Example
///
/// ```ignore
/// let pool = rethink_kit::create_pool(
///     ConnectionOptions::new().database("app"),
///     PoolOptions::default(),
/// )?;
/// let result = rethink_kit::run(&query, &pool).await?;
/// ```
pub fn create_pool(conn_options: ConnectionOptions, pool_options: PoolOptions) -> Result<Pool> {
    if conn_options.database.is_none() {
        return Err(Error::InvalidConfig(
            "pool connection options must name a database".to_string(),
        ));
    }
    if pool_options.max == 0 {
        return Err(Error::InvalidConfig(
            "pool maximum size must be at least 1".to_string(),
        ));
    }
    if pool_options.min > pool_options.max {
        return Err(Error::InvalidConfig(format!(
            "pool minimum size {} exceeds maximum size {}",
            pool_options.min, pool_options.max
        )));
    }

    let driver = registered_driver()?;
    let manager = ConnectionManager {
        driver,
        options: conn_options,
    };

    let inner = deadpool::managed::Pool::builder(manager)
        .max_size(pool_options.max)
        .build()
        .map_err(|err| Error::InvalidConfig(err.to_string()))?;

    let maintenance = match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(Arc::new(Maintenance {
            handle: handle.spawn(maintain(inner.clone(), pool_options)),
        })),
        Err(_) => {
            debug!("no tokio runtime current, pool maintenance disabled");
            None
        }
    };

    Ok(Pool {
        inner,
        _maintenance: maintenance,
    })
}

/// Bounded pool of reusable connections
#[derive(Clone)]
pub struct Pool {
    inner: deadpool::managed::Pool<ConnectionManager>,
    _maintenance: Option<Arc<Maintenance>>,
}

impl Pool {
    /// Acquire a connection, suspending until one is available.
    ///
    /// The returned guard releases the connection back to the pool when
    /// dropped.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        self.inner.get().await.map_err(|err| match err {
            PoolError::Backend(err) => err,
            PoolError::Timeout(kind) => {
                Error::Acquire(format!("timed out waiting for a connection: {:?}", kind))
            }
            PoolError::Closed => Error::Acquire("pool is closed".to_string()),
            PoolError::NoRuntimeSpecified => {
                Error::Acquire("no async runtime available".to_string())
            }
            PoolError::PostCreateHook(_) => {
                Error::Acquire("post-create hook failed".to_string())
            }
        })
    }

    /// Run a query on a pooled connection (bound-receiver form of
    /// [`run`](crate::run))
    pub async fn run<Q>(&self, query: &Q) -> Result<RunResult>
    where
        Q: Query + ?Sized,
    {
        executor::run(query, self).await
    }

    /// Current pool status
    pub fn status(&self) -> deadpool::Status {
        self.inner.status()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.inner.status())
            .finish()
    }
}

struct Maintenance {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for Maintenance {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Pre-warm the pool to its floor, then periodically evict connections idle
/// past the timeout, never shrinking below the floor.
async fn maintain(pool: deadpool::managed::Pool<ConnectionManager>, options: PoolOptions) {
    let mut warm = Vec::with_capacity(options.min);
    for _ in 0..options.min {
        match pool.get().await {
            Ok(conn) => warm.push(conn),
            Err(err) => {
                debug!(error = %err, "pool pre-warm stopped early");
                break;
            }
        }
    }
    drop(warm);

    let mut ticker = tokio::time::interval(options.idle_timeout);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        let excess = Cell::new(pool.status().size.saturating_sub(options.min));
        if excess.get() == 0 {
            continue;
        }
        pool.retain(|_, metrics| {
            if excess.get() > 0 && metrics.last_used() >= options.idle_timeout {
                excess.set(excess.get() - 1);
                false
            } else {
                true
            }
        });
    }
}
