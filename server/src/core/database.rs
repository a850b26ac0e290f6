//! Connection pool and unit of work.

use crate::core::AppError;
use crate::events::{DomainEvent, EventBus};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument};

/// SQLite pool plus the write permit every unit of work must hold.
///
/// SQLite allows one writer at a time. Taking the permit before `BEGIN`
/// makes read-modify-write sequences run one after another instead of
/// failing with `SQLITE_BUSY` halfway through.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    write_permit: Arc<Semaphore>,
}

impl Database {
    #[instrument(skip(url))]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!(max_connections, "Database pool ready");
        Ok(Self::from_pool(pool))
    }

    /// A private in-memory database with migrations applied.
    ///
    /// Each in-memory connection is its own database, so the pool is pinned to
    /// a single connection that never expires.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self::from_pool(pool);
        db.migrate().await?;
        Ok(db)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_permit: Arc::new(Semaphore::new(1)),
        }
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations applied");
        Ok(())
    }

    /// Pool for display reads outside any transaction.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<UnitOfWork, AppError> {
        let permit = self
            .write_permit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::service_unavailable("Database is shutting down"))?;
        let tx = self.pool.begin().await?;
        debug!("Unit of work started");
        Ok(UnitOfWork {
            tx,
            events: Vec::new(),
            _permit: permit,
        })
    }
}

/// One atomic transaction plus the events it will publish once committed.
///
/// Dropping a unit of work without calling [`commit`](Self::commit) rolls the
/// transaction back and discards its events.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    events: Vec<DomainEvent>,
    _permit: OwnedSemaphorePermit,
}

impl UnitOfWork {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Queues an event for delivery after commit.
    pub fn emit(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub async fn commit(self, bus: &dyn EventBus) -> Result<(), AppError> {
        let UnitOfWork {
            tx,
            events,
            _permit,
        } = self;
        tx.commit().await?;
        drop(_permit);

        debug!(events = events.len(), "Unit of work committed");
        for event in events {
            bus.publish(event);
        }
        Ok(())
    }
}
