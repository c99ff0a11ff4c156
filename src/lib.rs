//! member_tx - member repository and transactional transfers
//!
//! # Modules
//!
//! - [`config`] - YAML application and data source configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - connection provider, error translation, transaction coordinator
//! - [`member`] - member model, repository and transfer service

pub mod config;
pub mod db;
pub mod logging;
pub mod member;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use db::{
    ConnectionLease, DataAccessError, Database, DbContext, ErrorTranslator, LeaseStats, PoolStats,
    TransactionHandle, TransactionManager,
};
pub use member::{
    Member, MemberRepository, MemberService, ServiceError, SqlMemberRepository,
    TRANSFER_FAILURE_ID,
};
