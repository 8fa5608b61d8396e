//! Record store: SQLite connection pool, migrations, and transactional units.
//!
//! Every logical unit of work (one task create, one status change, one
//! read, one write batch) runs against its own connection or transaction,
//! so readers only ever observe committed state.

pub mod record;
pub mod task;

use std::str::FromStr;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

/// Database handle. Owns the connection pool shared by the API and the worker.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (or create) the SQLite database at `url` and build a pool.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://salesq.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Create a migrated in-memory database (for testing).
    ///
    /// An in-memory SQLite database lives only as long as its connection,
    /// so the pool pins exactly one connection and never recycles it.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Open a scoped transactional unit.
    ///
    /// Writes made through the returned context are applied only by
    /// [`TxContext::commit`]. Dropping the context on any other path,
    /// including `?` propagation, rolls everything back and returns the
    /// connection to the pool.
    pub async fn begin(&self) -> Result<TxContext> {
        let tx = self.pool.begin().await?;
        Ok(TxContext { tx })
    }
}

/// Handle for performing store operations within one transaction.
pub struct TxContext {
    tx: Transaction<'static, Sqlite>,
}

impl TxContext {
    /// Commit every write made through this context.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard every write made through this context.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    pub(crate) fn conn(&mut self) -> &mut sqlx::SqliteConnection {
        &mut *self.tx
    }
}

/// Timestamp format used for every stored instant.
///
/// Fixed-width UTC with microseconds, so lexical order equals time order.
pub(crate) fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| crate::error::Error::Other(format!("bad stored timestamp {raw:?}: {e}")))
}
