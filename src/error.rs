//! Error types for inbox-triage.

use std::time::Duration;

/// Configuration-related errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Record store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Classifier failures. The record is skipped for this cycle.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classifier {name} unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Classifier {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Invalid verdict from {name}: {reason}")]
    InvalidVerdict { name: String, reason: String },
}

/// Digest delivery failures. Retried on the next scheduled run.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid mailbox address: {0}")]
    InvalidMailbox(String),

    #[error("Failed to build message for {mailbox}: {reason}")]
    Build { mailbox: String, reason: String },

    #[error("Failed to send digest to {mailbox}: {reason}")]
    SendFailed { mailbox: String, reason: String },
}

/// Pipeline-level errors surfaced by the commit path and the secondary jobs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Record {id} is missing its correlation key")]
    MalformedRecord { id: String },

    #[error("Invalid deadline '{value}': {reason}")]
    DeadlineParse { value: String, reason: String },

    #[error("Write for record {id} not confirmed: {reason}")]
    WriteFailed { id: String, reason: String },

    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
