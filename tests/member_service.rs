mod common;

use common::{MEMBER_A, MEMBER_B, MEMBER_EX, TestHarness, sqlite_config};
use member_tx::{
    DataAccessError, Database, DbContext, Member, MemberRepository, ServiceError,
};
use sqlx::Connection;

async fn seed(h: &TestHarness, members: &[(&str, i64)]) {
    let mut ctx = DbContext::AutoCommit;
    for (id, money) in members {
        h.repository
            .save(&mut ctx, &Member::new(*id, *money))
            .await
            .expect("seed");
    }
}

async fn money_of(h: &TestHarness, id: &str) -> i64 {
    h.repository
        .find_by_id(&mut DbContext::AutoCommit, id)
        .await
        .expect("member should exist")
        .money
}

// ============================================================================
// Transfer
// ============================================================================

/// Test: normal transfer commits debit and credit
#[tokio::test]
async fn test_account_transfer() {
    let h = TestHarness::new().await;
    seed(&h, &[(MEMBER_A, 10000), (MEMBER_B, 10000)]).await;

    h.service
        .account_transfer(MEMBER_A, MEMBER_B, 2000)
        .await
        .expect("transfer should commit");

    assert_eq!(money_of(&h, MEMBER_A).await, 8000);
    assert_eq!(money_of(&h, MEMBER_B).await, 12000);
    h.assert_leases_balanced();
}

/// Test: failure after the debit rolls the debit back
#[tokio::test]
async fn test_account_transfer_ex() {
    let h = TestHarness::new().await;
    seed(&h, &[(MEMBER_A, 10000), (MEMBER_EX, 10000)]).await;

    let err = h
        .service
        .account_transfer(MEMBER_A, MEMBER_EX, 2000)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IllegalState(_)));
    assert_eq!(err.code(), "ILLEGAL_STATE");

    assert_eq!(money_of(&h, MEMBER_A).await, 10000);
    assert_eq!(money_of(&h, MEMBER_EX).await, 10000);
    h.assert_leases_balanced();
}

/// Test: a missing target aborts before any write and releases everything
#[tokio::test]
async fn test_account_transfer_missing_member() {
    let h = TestHarness::new().await;
    seed(&h, &[(MEMBER_A, 10000)]).await;

    let err = h
        .service
        .account_transfer(MEMBER_A, "nobody", 2000)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::DataAccess(DataAccessError::NotFound(ref id)) if id == "nobody"
    ));

    let err = h
        .service
        .account_transfer("nobody", MEMBER_A, 2000)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    assert_eq!(money_of(&h, MEMBER_A).await, 10000);
    h.assert_leases_balanced();
}

/// Test: balances may go negative; no non-negative rule is enforced
#[tokio::test]
async fn test_account_transfer_overdraw_allowed() {
    let h = TestHarness::new().await;
    seed(&h, &[(MEMBER_A, 1000), (MEMBER_B, 0)]).await;

    h.service
        .account_transfer(MEMBER_A, MEMBER_B, 2500)
        .await
        .unwrap();

    assert_eq!(money_of(&h, MEMBER_A).await, -1500);
    assert_eq!(money_of(&h, MEMBER_B).await, 2500);
}

/// Test: consecutive transfers each commit on their own transaction
#[tokio::test]
async fn test_repeated_transfers() {
    let h = TestHarness::new().await;
    seed(&h, &[(MEMBER_A, 10000), (MEMBER_B, 10000), (MEMBER_EX, 0)]).await;

    for _ in 0..3 {
        h.service
            .account_transfer(MEMBER_A, MEMBER_B, 1000)
            .await
            .unwrap();
        assert!(h
            .service
            .account_transfer(MEMBER_B, MEMBER_EX, 500)
            .await
            .is_err());
    }

    assert_eq!(money_of(&h, MEMBER_A).await, 7000);
    assert_eq!(money_of(&h, MEMBER_B).await, 13000);
    assert_eq!(money_of(&h, MEMBER_EX).await, 0);
    h.assert_leases_balanced();
    assert_eq!(h.db.lease_stats().outstanding(), 0);
}

/// Test: concurrent transfers on separate handles either commit whole or roll back
#[tokio::test]
async fn test_concurrent_transfers_roll_back_on_failure() {
    let h = TestHarness::new().await;
    seed(&h, &[(MEMBER_A, 10000), (MEMBER_B, 10000)]).await;

    let (r1, r2, r3, r4) = tokio::join!(
        h.service.account_transfer(MEMBER_A, MEMBER_B, 1000),
        h.service.account_transfer(MEMBER_A, MEMBER_B, 1000),
        h.service.account_transfer(MEMBER_A, MEMBER_B, 1000),
        h.service.account_transfer(MEMBER_A, MEMBER_B, 1000),
    );

    let results = [r1, r2, r3, r4];
    let committed = results.iter().filter(|r| r.is_ok()).count() as i64;
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        // Lock contention surfaces as a data access failure
        assert!(matches!(err, ServiceError::DataAccess(_)), "{err:?}");
    }

    let a = money_of(&h, MEMBER_A).await;
    let b = money_of(&h, MEMBER_B).await;
    assert_eq!(a + b, 20000);
    assert_eq!(a, 10000 - 1000 * committed);
    h.assert_leases_balanced();
}

// ============================================================================
// Duplicate key recovery
// ============================================================================

#[tokio::test]
async fn test_create_member_recovers_from_duplicate_key() {
    let h = TestHarness::new().await;

    let first = h.service.create_member("myId").await.unwrap();
    assert_eq!(first.member_id, "myId");

    let second = h.service.create_member("myId").await.unwrap();
    assert_ne!(second.member_id, "myId");
    assert!(second.member_id.starts_with("myId"));

    // Both rows are independently retrievable
    let mut ctx = DbContext::AutoCommit;
    let a = h.repository.find_by_id(&mut ctx, "myId").await.unwrap();
    let b = h
        .repository
        .find_by_id(&mut ctx, &second.member_id)
        .await
        .unwrap();
    assert_eq!(a, Member::new("myId", 0));
    assert_eq!(b, Member::new(second.member_id.clone(), 0));
    h.assert_leases_balanced();
}

#[tokio::test]
async fn test_create_member_propagates_other_failures() {
    let h = TestHarness::new().await;
    sqlx::query("drop table member")
        .execute(h.db.pool())
        .await
        .unwrap();

    let err = h.service.create_member("myId").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::DataAccess(DataAccessError::Query { .. })
    ));
    h.assert_leases_balanced();
}

// ============================================================================
// Connection provider
// ============================================================================

#[tokio::test]
async fn test_direct_connection_is_independent_of_pool() {
    let h = TestHarness::new().await;

    let mut con1 = Database::connect_direct(&h.config).await.unwrap();
    let mut con2 = Database::connect_direct(&h.config).await.unwrap();
    con1.ping().await.unwrap();
    con2.ping().await.unwrap();
    con1.close().await.unwrap();
    con2.close().await.unwrap();

    // Direct connections never touch the pool's lease accounting
    assert_eq!(h.db.lease_stats().acquired, 0);
}

#[tokio::test]
async fn test_pool_stats_reports_configured_name() {
    let h = TestHarness::new().await;
    let stats = h.db.pool_stats();
    assert_eq!(stats.pool_name, "TestPool");
    assert!(stats.total >= 1);
    assert!(stats.total <= 4);
}

#[tokio::test]
async fn test_connect_direct_bad_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = sqlite_config(&dir);
    // mode=ro on a file that does not exist cannot open
    config.url = format!(
        "sqlite://{}?mode=ro",
        dir.path().join("missing.db").display()
    );
    let err = Database::connect_direct(&config).await.unwrap_err();
    assert_eq!(err.code(), "CONNECTION_ERROR");
}
