//! Shared harness: a throwaway SQLite file behind the Any driver.

#![allow(dead_code)]

use std::sync::Arc;

use member_tx::{Database, DatabaseConfig, MemberService, SqlMemberRepository, TransactionManager};
use tempfile::TempDir;

pub const MEMBER_A: &str = "memberA";
pub const MEMBER_B: &str = "memberB";
pub const MEMBER_EX: &str = "ex";

pub struct TestHarness {
    pub db: Database,
    pub repository: Arc<SqlMemberRepository>,
    pub tx_manager: Arc<TransactionManager>,
    pub service: MemberService,
    pub config: DatabaseConfig,
    // Keeps the database file alive for the test
    _dir: TempDir,
}

pub fn sqlite_config(dir: &TempDir) -> DatabaseConfig {
    let path = dir.path().join("member.db");
    let mut config = DatabaseConfig::new(format!("sqlite://{}?mode=rwc", path.display()));
    config.max_pool_size = 4;
    config.pool_name = "TestPool".to_string();
    config
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = sqlite_config(&dir);
        let db = Database::connect(&config).await.expect("Failed to connect");
        db.initialize_schema()
            .await
            .expect("Failed to create schema");

        let repository = Arc::new(SqlMemberRepository::new(db.clone()));
        let tx_manager = Arc::new(TransactionManager::new(db.clone()));
        let service = MemberService::new(tx_manager.clone(), repository.clone());

        Self {
            db,
            repository,
            tx_manager,
            service,
            config,
            _dir: dir,
        }
    }

    /// All leases handed out so far have been released
    pub fn assert_leases_balanced(&self) {
        let stats = self.db.lease_stats();
        assert_eq!(
            stats.acquired, stats.released,
            "connection leases leaked: {:?}",
            stats
        );
    }
}
