//! sqlx error translation shared by the Postgres adapters.

use crate::domain::foundation::{DomainError, ErrorCode};

/// SQLSTATE for serialization failures under SERIALIZABLE isolation.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for a detected deadlock.
const DEADLOCK_DETECTED: &str = "40P01";

/// Maps a sqlx error to a domain error, classifying retryable conflicts.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if is_conflict_code(&code) {
                return DomainError::new(
                    ErrorCode::ConcurrencyConflict,
                    format!("{}: {}", context, db_err.message()),
                );
            }
        }
    }
    DomainError::database(context, err)
}

fn is_conflict_code(code: &str) -> bool {
    code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
}
