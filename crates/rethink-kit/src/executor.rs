//! Query execution and result normalization

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::connection::Connection;
use crate::driver::{Document, Outcome, Query};
use crate::error::{Error, Result};
use crate::pool::Pool;

/// Where a query should run, resolved once at the call boundary
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A single connection owned by the caller
    Connection(&'a Connection),

    /// A pool; one connection is acquired for the query and always released
    Pool(&'a Pool),
}

impl<'a> From<&'a Connection> for Target<'a> {
    fn from(conn: &'a Connection) -> Self {
        Target::Connection(conn)
    }
}

impl<'a> From<&'a Pool> for Target<'a> {
    fn from(pool: &'a Pool) -> Self {
        Target::Pool(pool)
    }
}

/// Run a query against a connection or a pool and normalize the result.
///
/// Cursor results are drained eagerly into an ordered sequence, so a live
/// cursor never escapes this boundary. When the target is a pool, exactly one
/// connection is acquired per call and released exactly once, on every exit
/// path: the pooled connection is an RAII guard that returns to the pool when
/// dropped, whether the query succeeded, failed, or failed mid-drain.
///
/// # Errors
///
/// [`Error::Acquire`] when the pool cannot provide a connection (the query is
/// never run), [`Error::Query`] for driver-reported execution failures, and
/// [`Error::CursorDrain`] when materializing a cursor fails. Nothing is
/// retried internally.
pub async fn run<'a, Q>(query: &Q, target: impl Into<Target<'a>>) -> Result<RunResult>
where
    Q: Query + ?Sized,
{
    match target.into() {
        Target::Connection(conn) => run_on(query, conn).await,
        Target::Pool(pool) => {
            let pooled = pool.acquire().await?;
            // Dropping `pooled` releases the slot on every exit path below.
            run_on(query, &pooled).await
        }
    }
}

async fn run_on<Q>(query: &Q, conn: &Connection) -> Result<RunResult>
where
    Q: Query + ?Sized,
{
    match query.run(conn).await? {
        Outcome::Atom(doc) => Ok(RunResult::Atom(doc)),
        Outcome::Cursor(mut cursor) => {
            let mut rows = Vec::new();
            loop {
                match cursor.try_next().await {
                    Ok(Some(doc)) => rows.push(doc),
                    Ok(None) => break,
                    Err(err) => return Err(Error::CursorDrain(err.to_string())),
                }
            }
            debug!(rows = rows.len(), "drained cursor");
            Ok(RunResult::Rows(rows))
        }
    }
}

/// Normalized result of a query: a single document, or the fully drained
/// contents of a cursor
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    /// A single document or scalar value
    Atom(Document),

    /// An ordered sequence of documents, materialized from a cursor
    Rows(Vec<Document>),
}

impl RunResult {
    /// The single document, when the result was not a cursor
    pub fn as_atom(&self) -> Option<&Document> {
        match self {
            RunResult::Atom(doc) => Some(doc),
            RunResult::Rows(_) => None,
        }
    }

    /// The result as an ordered sequence of documents.
    ///
    /// Cursor results convert directly; an atom that is a JSON array yields
    /// its elements, any other atom yields a single-element sequence.
    pub fn into_rows(self) -> Vec<Document> {
        match self {
            RunResult::Rows(rows) => rows,
            RunResult::Atom(Document::Array(items)) => items,
            RunResult::Atom(doc) => vec![doc],
        }
    }

    /// Number of documents in the result
    pub fn len(&self) -> usize {
        match self {
            RunResult::Atom(_) => 1,
            RunResult::Rows(rows) => rows.len(),
        }
    }

    /// Whether the result holds no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deserialize the result into a typed value.
    ///
    /// Atoms deserialize directly; drained cursors deserialize as a JSON
    /// array, so `Vec<T>` is the natural target for them.
    ///
    /// # Example
    ///
    /// ```ignore
    /// #[derive(Deserialize)]
    /// struct User { id: String, name: String }
    ///
    /// let users: Vec<User> = rethink_kit::run(&query, &pool).await?.deserialize()?;
    /// ```
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            RunResult::Atom(doc) => doc,
            RunResult::Rows(rows) => Document::Array(rows),
        };
        serde_json::from_value(value).map_err(Error::from)
    }
}
