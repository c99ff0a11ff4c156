//! member_tx demo
//!
//! Bootstraps the schema, seeds two scenarios and runs them through the
//! transactional transfer:
//!
//! ```text
//! memberA ──2000──▶ memberB   (commits)
//! memberA ──2000──▶ ex        (fails after debit, rolls back)
//! ```

use std::sync::Arc;

use anyhow::Context;
use member_tx::{
    AppConfig, Database, DbContext, Member, MemberRepository, MemberService,
    SqlMemberRepository, TRANSFER_FAILURE_ID, TransactionManager,
};

const MEMBER_A: &str = "memberA";
const MEMBER_B: &str = "memberB";
const INITIAL_MONEY: i64 = 10_000;
const TRANSFER_AMOUNT: i64 = 2_000;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

async fn snapshot(
    repository: &dyn MemberRepository,
    ids: &[&str],
) -> anyhow::Result<Vec<Member>> {
    let mut members = Vec::with_capacity(ids.len());
    for id in ids {
        members.push(repository.find_by_id(&mut DbContext::AutoCommit, id).await?);
    }
    Ok(members)
}

async fn reset(repository: &dyn MemberRepository) -> anyhow::Result<()> {
    for id in [MEMBER_A, MEMBER_B, TRANSFER_FAILURE_ID] {
        repository.delete(&mut DbContext::AutoCommit, id).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).context("loading configuration")?;
    let _log_guard = member_tx::logging::init_logging(&app_config);

    tracing::info!(
        "Starting member_tx ({}) in {} mode",
        env!("GIT_HASH"),
        env
    );

    let db = Database::connect(&app_config.database)
        .await
        .context("connecting to database")?;
    db.initialize_schema().await?;
    db.log_pool_stats();

    let repository = Arc::new(SqlMemberRepository::new(db.clone()));
    let tx_manager = Arc::new(TransactionManager::new(db.clone()));
    let service = MemberService::new(tx_manager, repository.clone());

    // Scenario 1: normal transfer
    reset(repository.as_ref()).await?;
    let mut ctx = DbContext::AutoCommit;
    repository
        .save(&mut ctx, &Member::new(MEMBER_A, INITIAL_MONEY))
        .await?;
    repository
        .save(&mut ctx, &Member::new(MEMBER_B, INITIAL_MONEY))
        .await?;
    service
        .account_transfer(MEMBER_A, MEMBER_B, TRANSFER_AMOUNT)
        .await?;
    let committed = snapshot(repository.as_ref(), &[MEMBER_A, MEMBER_B]).await?;
    println!("committed: {}", serde_json::to_string(&committed)?);

    // Scenario 2: failure between debit and credit
    reset(repository.as_ref()).await?;
    repository
        .save(&mut ctx, &Member::new(MEMBER_A, INITIAL_MONEY))
        .await?;
    repository
        .save(&mut ctx, &Member::new(TRANSFER_FAILURE_ID, INITIAL_MONEY))
        .await?;
    match service
        .account_transfer(MEMBER_A, TRANSFER_FAILURE_ID, TRANSFER_AMOUNT)
        .await
    {
        Ok(()) => anyhow::bail!("transfer to sentinel member unexpectedly committed"),
        Err(e) => tracing::info!(code = e.code(), "transfer rejected as expected: {}", e),
    }
    let rolled_back = snapshot(repository.as_ref(), &[MEMBER_A, TRANSFER_FAILURE_ID]).await?;
    println!("rolled back: {}", serde_json::to_string(&rolled_back)?);

    reset(repository.as_ref()).await?;

    let leases = db.lease_stats();
    tracing::info!(
        acquired = leases.acquired,
        released = leases.released,
        "connection leases balanced: {}",
        leases.outstanding() == 0
    );
    db.log_pool_stats();
    db.close().await;
    Ok(())
}
