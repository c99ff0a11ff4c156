//! Transaction coordinator
//!
//! `begin` binds one pooled connection to a [`TransactionHandle`]; `commit`
//! and `rollback` consume the handle and give the connection back. There is
//! no ambient per-thread state: repository calls join a transaction only when
//! handed [`DbContext::Transaction`].
//!
//! ```text
//! begin ──▶ [handle owns connection] ──▶ commit   ──▶ released
//!                    │                └─▶ rollback ──▶ released
//!                    └─ repository ops reuse the bound connection
//! ```

use sqlx::{Any, AnyConnection, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::error::DataAccessError;
use super::{ConnectionLease, Database, LeaseGuard};

/// Where a repository operation gets its connection from.
pub enum DbContext<'t> {
    /// No transaction: each operation takes a pooled connection and returns it
    AutoCommit,
    /// Operations reuse the connection bound to this transaction
    Transaction(&'t mut TransactionHandle),
}

impl DbContext<'_> {
    pub fn tx_id(&self) -> Option<u64> {
        match self {
            DbContext::AutoCommit => None,
            DbContext::Transaction(handle) => Some(handle.id()),
        }
    }

    /// Lease a connection for one operation.
    ///
    /// In a transaction the lease borrows the bound connection and its release
    /// is a no-op; otherwise a pooled connection is acquired from `db`.
    pub async fn acquire<'c>(
        &'c mut self,
        db: &Database,
    ) -> Result<ConnectionLease<'c>, DataAccessError> {
        match self {
            DbContext::AutoCommit => db.get_connection().await,
            DbContext::Transaction(handle) => {
                let tx_id = handle.id();
                debug!(tx_id = tx_id, "using transaction-bound connection");
                Ok(ConnectionLease::Bound {
                    conn: handle.connection(),
                    tx_id,
                })
            }
        }
    }
}

/// An active transaction and the connection bound to it.
///
/// Dropping the handle without `commit`/`rollback` rolls back.
pub struct TransactionHandle {
    id: u64,
    tx: Transaction<'static, Any>,
    guard: LeaseGuard,
}

impl TransactionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn connection(&mut self) -> &mut AnyConnection {
        &mut self.tx
    }
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

pub struct TransactionManager {
    db: Database,
    next_id: AtomicU64,
}

impl TransactionManager {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Start a transaction on a fresh pooled connection
    pub async fn begin(&self) -> Result<TransactionHandle, DataAccessError> {
        let tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| self.db.translator().translate("begin", e))?;
        let guard = LeaseGuard::acquire(self.db.lease_counter());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(tx_id = id, "transaction started");
        Ok(TransactionHandle { id, tx, guard })
    }

    /// Persist everything since `begin` and release the connection
    pub async fn commit(&self, handle: TransactionHandle) -> Result<(), DataAccessError> {
        let TransactionHandle { id, tx, guard } = handle;
        let result = tx
            .commit()
            .await
            .map_err(|e| self.db.translator().translate("commit", e));
        drop(guard);
        result?;
        info!(tx_id = id, "transaction committed");
        Ok(())
    }

    /// Discard everything since `begin` and release the connection
    pub async fn rollback(&self, handle: TransactionHandle) -> Result<(), DataAccessError> {
        let TransactionHandle { id, tx, guard } = handle;
        let result = tx
            .rollback()
            .await
            .map_err(|e| self.db.translator().translate("rollback", e));
        drop(guard);
        result?;
        info!(tx_id = id, "transaction rolled back");
        Ok(())
    }
}
