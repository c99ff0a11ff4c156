//! Data access error taxonomy and vendor error-code translation
//!
//! Driver failures never leave the repository as raw `sqlx::Error`; they are
//! classified here and carried only as the `#[source]` of a typed kind.

use thiserror::Error;

/// Vendor codes for primary-key / unique violations.
///
/// - `23505`: Postgres and H2 unique violation
/// - `23001`: H2 legacy duplicate key
/// - `1062`: MySQL duplicate entry
/// - `1555`, `2067`: SQLite extended codes for PRIMARYKEY / UNIQUE
pub const DEFAULT_DUPLICATE_KEY_CODES: &[&str] = &["23505", "23001", "1062", "1555", "2067"];

#[derive(Error, Debug)]
pub enum DataAccessError {
    #[error("Cannot obtain connection: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Duplicate key on {task} (vendor code {code})")]
    DuplicateKey {
        task: &'static str,
        code: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Member not found: memberId={0}")]
    NotFound(String),

    #[error("Data access failure on {task}: {source}")]
    Query {
        task: &'static str,
        code: Option<String>,
        #[source]
        source: sqlx::Error,
    },
}

impl DataAccessError {
    /// Stable identifier for logs and API mapping
    pub fn code(&self) -> &'static str {
        match self {
            DataAccessError::Connection(_) => "CONNECTION_ERROR",
            DataAccessError::DuplicateKey { .. } => "DUPLICATE_KEY",
            DataAccessError::NotFound(_) => "NOT_FOUND",
            DataAccessError::Query { .. } => "DATA_ACCESS_ERROR",
        }
    }

    /// Only a duplicate key can be fixed by the caller (new id, retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DataAccessError::DuplicateKey { .. })
    }

    /// Vendor error code reported by the driver, if any
    pub fn vendor_code(&self) -> Option<&str> {
        match self {
            DataAccessError::DuplicateKey { code, .. } => Some(code),
            DataAccessError::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Maps `sqlx::Error` into [`DataAccessError`] using a vendor code table.
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    duplicate_key_codes: Vec<String>,
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::with_extra_codes(&[])
    }
}

impl ErrorTranslator {
    /// Default table plus `extra` duplicate-key codes
    pub fn with_extra_codes(extra: &[String]) -> Self {
        let mut duplicate_key_codes: Vec<String> = DEFAULT_DUPLICATE_KEY_CODES
            .iter()
            .map(|c| c.to_string())
            .collect();
        for code in extra {
            if !duplicate_key_codes.contains(code) {
                duplicate_key_codes.push(code.clone());
            }
        }
        Self {
            duplicate_key_codes,
        }
    }

    pub fn is_duplicate_key_code(&self, code: &str) -> bool {
        self.duplicate_key_codes.iter().any(|c| c == code)
    }

    /// Translate a failure raised while running `task`.
    pub fn translate(&self, task: &'static str, err: sqlx::Error) -> DataAccessError {
        let vendor = match &err {
            sqlx::Error::Database(db_err) => Some((
                db_err.code().map(|c| c.into_owned()),
                db_err.is_unique_violation(),
            )),
            _ => None,
        };

        if let Some((code, unique_violation)) = vendor {
            let known_code = code
                .as_deref()
                .is_some_and(|c| self.is_duplicate_key_code(c));
            return if known_code || unique_violation {
                DataAccessError::DuplicateKey {
                    task,
                    code: code.unwrap_or_default(),
                    source: err,
                }
            } else {
                DataAccessError::Query {
                    task,
                    code,
                    source: err,
                }
            };
        }

        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_) => DataAccessError::Connection(err),
            other => DataAccessError::Query {
                task,
                code: None,
                source: other,
            },
        }
    }
}
