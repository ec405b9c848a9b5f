use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the term store, the rollover workflow and the deletion guard.
///
/// Every variant maps to a stable wire code (see [`TermError::code`]); the UI keys its
/// operator guidance off the code and shows the message verbatim.
#[derive(Debug, Error)]
pub enum TermError {
    #[error("term {term_number} of academic year {academic_year} already exists")]
    DuplicateTerm {
        term_number: i64,
        academic_year: String,
    },

    #[error("term {0} is not the current term")]
    NoCurrentTerm(String),

    #[error("term number must be between 1 and 4 (got {0})")]
    InvalidTermNumber(i64),

    #[error("\"{0}\" is the current term and cannot be deleted")]
    CannotDeleteCurrentTerm(String),

    #[error("confirmation text does not match the term name \"{expected}\"")]
    ConfirmationMismatch { expected: String },

    #[error("could not aggregate term records for student {student_id}: {source}")]
    SnapshotAggregation {
        student_id: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadParams(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    pub fn code(&self) -> &'static str {
        match self {
            TermError::DuplicateTerm { .. } => "duplicate_term",
            TermError::NoCurrentTerm(_) => "no_current_term",
            TermError::InvalidTermNumber(_) => "invalid_term_number",
            TermError::CannotDeleteCurrentTerm(_) => "cannot_delete_current_term",
            TermError::ConfirmationMismatch { .. } => "confirmation_mismatch",
            TermError::SnapshotAggregation { .. } => "snapshot_aggregation_failed",
            TermError::NotFound(_) => "not_found",
            TermError::BadParams(_) => "bad_params",
            TermError::Forbidden(_) => "forbidden",
            TermError::Database(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            TermError::DuplicateTerm {
                term_number,
                academic_year,
            } => Some(json!({
                "termNumber": term_number,
                "academicYear": academic_year,
            })),
            TermError::NoCurrentTerm(term_id) => Some(json!({ "termId": term_id })),
            TermError::SnapshotAggregation { student_id, .. } => {
                Some(json!({ "studentId": student_id }))
            }
            _ => None,
        }
    }

    pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
        matches!(
            e,
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
