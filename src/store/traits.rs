//! `RecordStore` trait: the single async interface the pipeline persists through.
//!
//! The store is the only coordination point between the batch scanner, the
//! change-feed watcher and the daily jobs. Nothing else is shared in-process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::DatabaseError;
use crate::mailbox::Mailbox;
use crate::model::{NewRecord, Record, RecordId, RecordUpdate, UrgencyTier};

/// One operation in a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Apply a classification update to an unprocessed record.
    Commit { id: RecordId, update: RecordUpdate },
    /// Change only the urgency tier of a processed record.
    SetUrgency { id: RecordId, tier: UrgencyTier },
    /// Remove a record (duplicates only).
    Delete { id: RecordId },
}

impl WriteOp {
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Commit { id, .. } | Self::SetUrgency { id, .. } | Self::Delete { id } => id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Commit { .. } => "commit",
            Self::SetUrgency { .. } => "set_urgency",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A single op the store did not confirm.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub id: RecordId,
    pub op: &'static str,
    pub reason: String,
}

/// Outcome of a non-atomic bulk write.
#[derive(Debug, Clone, Default)]
pub struct BulkWriteResult {
    /// Ops that matched and modified a record (commits and urgency changes).
    pub modified: usize,
    pub deleted: usize,
    /// Ops that matched nothing (record already gone or already processed).
    pub unmatched: usize,
    pub failures: Vec<WriteFailure>,
}

impl BulkWriteResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Kind of change published on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A change-feed notification. Carries only the reference; watchers re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub mailbox: String,
    pub record_id: RecordId,
    pub kind: ChangeKind,
}

/// Backend-agnostic record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create tables and indexes (idempotent).
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Raw names of every partition that holds at least one record.
    async fn list_mailboxes(&self) -> Result<Vec<String>, DatabaseError>;

    // ── Ingestion ───────────────────────────────────────────────────

    /// Stage a new unprocessed record. Publishes an insert notification.
    async fn insert_record(
        &self,
        mailbox: &Mailbox,
        record: &NewRecord,
    ) -> Result<RecordId, DatabaseError>;

    /// Set the user-controlled `completed` flag. Publishes an update notification.
    async fn set_completed(
        &self,
        mailbox: &Mailbox,
        id: &RecordId,
        completed: bool,
    ) -> Result<bool, DatabaseError>;

    // ── Reads ───────────────────────────────────────────────────────

    async fn get_record(
        &self,
        mailbox: &Mailbox,
        id: &RecordId,
    ) -> Result<Option<Record>, DatabaseError>;

    /// Every record in a mailbox, in store-native order.
    async fn list_records(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError>;

    /// Up to `limit` unprocessed records that carry a correlation key, in
    /// store-native order. Keyless records never occupy batch slots.
    async fn fetch_unprocessed(
        &self,
        mailbox: &Mailbox,
        limit: usize,
    ) -> Result<Vec<Record>, DatabaseError>;

    /// Unprocessed records with no correlation key.
    async fn unkeyed_unprocessed(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError>;

    /// Unprocessed records whose correlation key already has a processed twin.
    async fn shadowed_unprocessed(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError>;

    /// Processed, incomplete records that carry a deadline.
    async fn open_with_deadline(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError>;

    /// Processed, incomplete records currently tiered `Urgent`.
    async fn urgent_open(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError>;

    // ── Writes ──────────────────────────────────────────────────────

    /// Apply a mixed list of ops independently. Not atomic across the list;
    /// per-op failures are reported in the result rather than as `Err`.
    async fn bulk_write(
        &self,
        mailbox: &Mailbox,
        ops: &[WriteOp],
    ) -> Result<BulkWriteResult, DatabaseError>;

    // ── Change feed ─────────────────────────────────────────────────

    /// Subscribe to insert/update notifications across all mailboxes.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
