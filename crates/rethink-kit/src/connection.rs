//! Connection handle and the single-connection provider

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::ConnectionOptions;
use crate::driver::{registered_driver, Query, RawConnection};
use crate::error::Result;
use crate::executor::{self, RunResult};

/// Open a single connection through the registered driver.
///
/// Fails with [`Error::DriverUnavailable`](crate::Error::DriverUnavailable)
/// before any I/O when no driver has been registered; driver-reported
/// failures surface as [`Error::Connection`](crate::Error::Connection).
/// No retries.
///
/// # Example
///
/// ```ignore
/// let conn = rethink_kit::connect(&ConnectionOptions::new().database("app")).await?;
/// let result = conn.run(&query).await?;
/// conn.close().await?;
/// ```
pub async fn connect(options: &ConnectionOptions) -> Result<Connection> {
    let driver = registered_driver()?;
    debug!(host = %options.host, port = options.port, "opening connection");
    driver.connect(options).await
}

/// Handle to an open database connection.
///
/// The handle is cheap to clone; clones share the same underlying transport,
/// and queries running on it are serialized by an internal async lock, so a
/// concurrent batch of queries over one connection interleaves safely.
#[derive(Clone)]
pub struct Connection {
    raw: Arc<Mutex<Box<dyn RawConnection>>>,
}

impl Connection {
    /// Wrap a driver transport handle
    pub fn new(raw: Box<dyn RawConnection>) -> Self {
        Self {
            raw: Arc::new(Mutex::new(raw)),
        }
    }

    /// Lock the underlying transport for the duration of one query.
    ///
    /// Driver query implementations use this together with
    /// [`RawConnection::as_any`] to reach their concrete connection type.
    pub async fn raw(&self) -> MutexGuard<'_, Box<dyn RawConnection>> {
        self.raw.lock().await
    }

    /// Run a query on this connection (bound-receiver form of
    /// [`run`](crate::run))
    pub async fn run<Q>(&self, query: &Q) -> Result<RunResult>
    where
        Q: Query + ?Sized,
    {
        executor::run(query, self).await
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<()> {
        self.raw.lock().await.close().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
