use thiserror::Error;

use crate::db::DataAccessError;

/// Failures surfaced by [`super::MemberService`]
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::DataAccess(e) => e.code(),
            ServiceError::IllegalState(_) => "ILLEGAL_STATE",
        }
    }
}
