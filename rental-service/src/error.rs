use diesel_async::pooled_connection::PoolError;
use rental_shared::{DocStatus, RuleViolation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{doctype} {name} not found")]
    NotFound { doctype: String, name: String },

    #[error("{doctype} {name} already exists")]
    Duplicate { doctype: String, name: String },

    #[error("{doctype} {name} is submitted and cannot be edited")]
    SubmittedImmutable { doctype: String, name: String },

    #[error("{doctype} {name} is cancelled and cannot be edited")]
    CancelledImmutable { doctype: String, name: String },

    #[error("{doctype} {name} cannot move from {from} to {to}")]
    InvalidTransition {
        doctype: String,
        name: String,
        from: DocStatus,
        to: DocStatus,
    },

    #[error("{doctype} {name} is submitted and cannot be deleted")]
    NotDeletable { doctype: String, name: String },

    #[error("stored {doctype} {name} has unknown docstatus {value}")]
    CorruptDocStatus { doctype: String, name: String, value: i16 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Failures of the store itself, as opposed to refusals of a specific
    /// write. Outages surface as hard errors to the caller.
    pub fn is_outage(&self) -> bool {
        matches!(
            self,
            StoreError::CorruptDocStatus { .. }
                | StoreError::Serialization(_)
                | StoreError::Database(_)
                | StoreError::Connection(_)
                | StoreError::Unavailable(_)
                | StoreError::Migration(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::Duplicate { .. } => "duplicate",
            StoreError::SubmittedImmutable { .. } | StoreError::CancelledImmutable { .. } => "document_locked",
            StoreError::InvalidTransition { .. } => "invalid_transition",
            StoreError::NotDeletable { .. } => "not_deletable",
            _ => "store_unavailable",
        }
    }
}

impl From<bb8::RunError<PoolError>> for StoreError {
    fn from(err: bb8::RunError<PoolError>) -> Self {
        StoreError::Connection(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn is_outage(&self) -> bool {
        matches!(self, WorkflowError::Store(err) if err.is_outage())
    }
}
