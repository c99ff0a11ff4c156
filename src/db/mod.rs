//! Database connection management
//!
//! [`Database`] is the connection provider: a pooled data source built from
//! [`DatabaseConfig`], plus a direct unpooled path for one-off connections.
//! Every connection handed out is wrapped in a [`ConnectionLease`] so the
//! number of acquisitions and releases stays observable.

pub mod error;
pub mod transaction;

pub use error::{DataAccessError, ErrorTranslator};
pub use transaction::{DbContext, TransactionHandle, TransactionManager};

use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Connection};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::DatabaseConfig;

const CREATE_MEMBER_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS member (
    member_id varchar(10) PRIMARY KEY,
    money integer NOT NULL DEFAULT 0
)"#;

/// Snapshot of lease accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseStats {
    pub acquired: u64,
    pub released: u64,
}

impl LeaseStats {
    /// Leases currently held by callers
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// Pool occupancy, in the shape HikariCP reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_name: String,
    pub total: u32,
    pub idle: usize,
    pub active: usize,
}

#[derive(Debug, Default)]
pub(crate) struct LeaseCounter {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl LeaseCounter {
    fn snapshot(&self) -> LeaseStats {
        LeaseStats {
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
        }
    }
}

/// Marks one acquired connection; counts the release when dropped.
#[derive(Debug)]
pub struct LeaseGuard {
    counter: Arc<LeaseCounter>,
}

impl LeaseGuard {
    pub(crate) fn acquire(counter: &Arc<LeaseCounter>) -> Self {
        counter.acquired.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.counter.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A connection obtained for one repository operation.
pub enum ConnectionLease<'c> {
    /// Taken from the pool; returned to it on release or drop
    Pooled {
        conn: PoolConnection<Any>,
        guard: LeaseGuard,
    },
    /// Owned by an active transaction; release leaves it bound
    Bound { conn: &'c mut AnyConnection, tx_id: u64 },
}

impl ConnectionLease<'_> {
    pub fn connection(&mut self) -> &mut AnyConnection {
        match self {
            ConnectionLease::Pooled { conn, .. } => &mut **conn,
            ConnectionLease::Bound { conn, .. } => &mut **conn,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, ConnectionLease::Bound { .. })
    }

    /// Release the connection. A bound connection stays with its transaction.
    pub fn release(self) {
        match self {
            ConnectionLease::Pooled { conn, guard } => {
                tracing::debug!("returning connection to pool");
                drop(conn);
                drop(guard);
            }
            ConnectionLease::Bound { tx_id, .. } => {
                tracing::debug!(tx_id = tx_id, "keeping transaction-bound connection");
            }
        }
    }
}

/// Pooled data source
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    pool_name: String,
    leases: Arc<LeaseCounter>,
    translator: ErrorTranslator,
}

impl Database {
    /// Create a new connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataAccessError> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_pool_size)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.connection_url())
            .await
            .map_err(DataAccessError::Connection)?;

        tracing::info!(
            pool = %config.pool_name,
            max_pool_size = config.max_pool_size,
            "connection pool established"
        );

        Ok(Self {
            pool,
            pool_name: config.pool_name.clone(),
            leases: Arc::new(LeaseCounter::default()),
            translator: ErrorTranslator::with_extra_codes(&config.duplicate_key_codes),
        })
    }

    /// Open a fresh physical connection, bypassing the pool.
    ///
    /// Every call pays the full connect cost; use [`Database::connect`] for
    /// anything but one-off work. The caller closes the connection.
    pub async fn connect_direct(config: &DatabaseConfig) -> Result<AnyConnection, DataAccessError> {
        sqlx::any::install_default_drivers();

        let conn = AnyConnection::connect(&config.connection_url())
            .await
            .map_err(DataAccessError::Connection)?;
        tracing::info!("direct connection opened");
        Ok(conn)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    pub(crate) fn lease_counter(&self) -> &Arc<LeaseCounter> {
        &self.leases
    }

    /// Acquire a pooled connection wrapped in a lease
    pub async fn get_connection(&self) -> Result<ConnectionLease<'static>, DataAccessError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(DataAccessError::Connection)?;
        let guard = LeaseGuard::acquire(&self.leases);
        tracing::debug!(pool = %self.pool_name, "connection acquired");
        Ok(ConnectionLease::Pooled { conn, guard })
    }

    /// Create the member table if it does not exist
    pub async fn initialize_schema(&self) -> Result<(), DataAccessError> {
        sqlx::query(CREATE_MEMBER_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| self.translator.translate("initializeSchema", e))?;
        tracing::info!("member schema ready");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), DataAccessError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| self.translator.translate("healthCheck", e))?;
        Ok(())
    }

    pub fn lease_stats(&self) -> LeaseStats {
        self.leases.snapshot()
    }

    pub fn pool_stats(&self) -> PoolStats {
        let total = self.pool.size();
        let idle = self.pool.num_idle();
        PoolStats {
            pool_name: self.pool_name.clone(),
            total,
            idle,
            active: (total as usize).saturating_sub(idle),
        }
    }

    pub fn log_pool_stats(&self) {
        let stats = self.pool_stats();
        tracing::info!(
            "{} - stats (total={}, active={}, idle={})",
            stats.pool_name,
            stats.total,
            stats.active,
            stats.idle
        );
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(pool = %self.pool_name, "connection pool closed");
    }
}
