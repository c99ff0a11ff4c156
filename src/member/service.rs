//! Member business operations
//!
//! # Transfer
//!
//! ```text
//! begin ─▶ find(from) ─▶ find(to) ─▶ debit(from) ─▶ validate(to) ─▶ credit(to) ─▶ commit
//!              └──────────────── any error ────────────────────────────────┴─▶ rollback
//! ```
//!
//! Debit and credit run on the same transaction-bound connection, so a
//! failure after the debit leaves no trace once rolled back.

use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::ServiceError;
use super::models::Member;
use super::repository::MemberRepository;
use crate::db::{DataAccessError, DbContext, TransactionManager};

/// Reserved member id that makes a transfer fail between debit and credit
pub const TRANSFER_FAILURE_ID: &str = "ex";

/// Upper bound (exclusive) of the suffix appended on duplicate-key retry
const RETRY_ID_SUFFIX_BOUND: u32 = 10_000;

pub struct MemberService {
    tx_manager: Arc<TransactionManager>,
    repository: Arc<dyn MemberRepository>,
}

impl MemberService {
    pub fn new(tx_manager: Arc<TransactionManager>, repository: Arc<dyn MemberRepository>) -> Self {
        Self {
            tx_manager,
            repository,
        }
    }

    /// Move `amount` from `from_id` to `to_id` atomically.
    ///
    /// Any failure inside the unit of work rolls back every change made since
    /// `begin`, including an already applied debit.
    pub async fn account_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let mut tx = self.tx_manager.begin().await?;
        let tx_id = tx.id();
        info!(tx_id = tx_id, from = from_id, to = to_id, amount = amount, "transfer started");

        let result = self
            .biz_logic(&mut DbContext::Transaction(&mut tx), from_id, to_id, amount)
            .await;

        match result {
            Ok(()) => {
                self.tx_manager.commit(tx).await?;
                info!(tx_id = tx_id, "transfer committed");
                Ok(())
            }
            Err(e) => {
                warn!(tx_id = tx_id, code = e.code(), error = %e, "transfer failed, rolling back");
                if let Err(rollback_err) = self.tx_manager.rollback(tx).await {
                    error!(tx_id = tx_id, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn biz_logic(
        &self,
        ctx: &mut DbContext<'_>,
        from_id: &str,
        to_id: &str,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let from_member = self.repository.find_by_id(ctx, from_id).await?;
        let to_member = self.repository.find_by_id(ctx, to_id).await?;

        self.repository
            .update(ctx, from_id, from_member.money - amount)
            .await?;
        validation(&to_member)?;
        self.repository
            .update(ctx, to_id, to_member.money + amount)
            .await?;
        Ok(())
    }

    /// Insert a zero-balance member, retrying once with a fresh id on a
    /// duplicate key. Returns the member actually stored.
    pub async fn create_member(&self, member_id: &str) -> Result<Member, ServiceError> {
        let mut ctx = DbContext::AutoCommit;
        let first = self
            .repository
            .save(&mut ctx, &Member::new(member_id, 0))
            .await;
        match first {
            Ok(saved) => {
                info!(member_id = %saved.member_id, "saveId={}", saved.member_id);
                Ok(saved)
            }
            Err(DataAccessError::DuplicateKey { code, .. }) => {
                let retry_id = generate_new_id(member_id);
                warn!(
                    member_id = member_id,
                    code = %code,
                    retry_id = %retry_id,
                    "duplicate key, retrying with new id"
                );
                let saved = self
                    .repository
                    .save(&mut ctx, &Member::new(retry_id, 0))
                    .await?;
                Ok(saved)
            }
            Err(e) => {
                info!(code = e.code(), error = %e, "data access layer failure");
                Err(e.into())
            }
        }
    }
}

fn validation(to_member: &Member) -> Result<(), ServiceError> {
    if to_member.member_id == TRANSFER_FAILURE_ID {
        return Err(ServiceError::IllegalState(
            "error during transfer".to_string(),
        ));
    }
    Ok(())
}

/// Appends up to four digits. Ids longer than six characters can outgrow
/// `member_id varchar(10)`; the retry then fails on backends that enforce
/// the length (Postgres) and surfaces as `DataAccessError::Query`.
fn generate_new_id(member_id: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..RETRY_ID_SUFFIX_BOUND);
    format!("{}{}", member_id, suffix)
}
