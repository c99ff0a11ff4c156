//! Member management module
//!
//! Repository over the `member` table and the transfer service built on it.

pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use error::ServiceError;
pub use models::Member;
pub use repository::{MemberRepository, SqlMemberRepository};
pub use service::{MemberService, TRANSFER_FAILURE_ID};
