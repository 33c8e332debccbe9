//! Dedup resolution: "first processed wins".
//!
//! Within a batch only the first record per correlation key is committed and
//! later copies are deleted. After every scan the reconciliation sweep deletes
//! unprocessed records whose key already has a processed twin. Keyless records
//! are never deleted.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::mailbox::Mailbox;
use crate::model::{Record, RecordId};
use crate::store::{RecordStore, WriteOp};

/// How a fetched batch splits up.
#[derive(Debug, Default)]
pub struct BatchPlan {
    /// First record per key, in scan order.
    pub to_commit: Vec<Record>,
    /// Later records sharing a key with an earlier one in the batch.
    pub duplicates: Vec<RecordId>,
    /// Records with no correlation key.
    pub malformed: Vec<RecordId>,
}

/// Split a batch (in scan order) into canonical records, duplicates and malformed records.
pub fn resolve_batch(records: Vec<Record>) -> BatchPlan {
    let mut plan = BatchPlan::default();
    let mut seen: HashSet<String> = HashSet::new();

    for record in records {
        match record.correlation_key.as_deref() {
            None => plan.malformed.push(record.id),
            Some(key) if !seen.insert(key.to_string()) => plan.duplicates.push(record.id),
            Some(_) => plan.to_commit.push(record),
        }
    }
    plan
}

/// Delete every unprocessed record in `mailbox` whose key has a processed
/// counterpart. Returns the number of records removed.
pub async fn reconcile_sweep(
    store: &dyn RecordStore,
    mailbox: &Mailbox,
) -> Result<usize, DatabaseError> {
    let shadowed = store.shadowed_unprocessed(mailbox).await?;
    if shadowed.is_empty() {
        return Ok(0);
    }

    let ops: Vec<WriteOp> = shadowed
        .into_iter()
        .map(|r| WriteOp::Delete { id: r.id })
        .collect();
    let result = store.bulk_write(mailbox, &ops).await?;

    for failure in &result.failures {
        warn!(mailbox = %mailbox, id = %failure.id, reason = %failure.reason, "Sweep delete failed");
    }
    if result.deleted > 0 {
        info!(mailbox = %mailbox, deleted = result.deleted, "Removed shadowed duplicates");
    }
    Ok(result.deleted)
}
