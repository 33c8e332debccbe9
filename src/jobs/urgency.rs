//! Urgency reconciler: re-tiers open tasks as their deadlines approach.
//!
//! Only processed, incomplete records with a stored deadline are touched, and
//! only their `urgency_tier`. Unparseable deadlines are logged and skipped.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::context::ServiceContext;
use crate::error::{DatabaseError, PipelineError};
use crate::mailbox::{Mailbox, valid_mailboxes};
use crate::model::{UrgencyTier, parse_deadline};
use crate::store::{RecordStore, WriteOp};

/// Totals from one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub updated: usize,
    pub invalid_deadlines: usize,
    pub write_failures: usize,
}

impl ReconcileReport {
    fn absorb(&mut self, other: &ReconcileReport) {
        self.checked += other.checked;
        self.updated += other.updated;
        self.invalid_deadlines += other.invalid_deadlines;
        self.write_failures += other.write_failures;
    }
}

/// Tier implied by whole days remaining until `deadline`.
pub fn tier_for_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> UrgencyTier {
    UrgencyTier::from_days_until((deadline - now).num_days())
}

/// Reconcile one mailbox against `now`.
pub async fn reconcile_mailbox(
    store: &dyn RecordStore,
    mailbox: &Mailbox,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, DatabaseError> {
    let mut report = ReconcileReport::default();
    let mut ops = Vec::new();

    for record in store.open_with_deadline(mailbox).await? {
        report.checked += 1;
        let Some(raw) = record.deadline.as_deref() else {
            continue;
        };
        let deadline = match parse_deadline(raw) {
            Ok(d) => d,
            Err(e) => {
                report.invalid_deadlines += 1;
                warn!(mailbox = %mailbox, id = %record.id, error = %e, "Skipping record with unparseable deadline");
                continue;
            }
        };

        let tier = tier_for_deadline(deadline, now);
        if record.urgency_tier != Some(tier) {
            ops.push(WriteOp::SetUrgency {
                id: record.id,
                tier,
            });
        }
    }

    if !ops.is_empty() {
        let result = store.bulk_write(mailbox, &ops).await?;
        report.updated = result.modified;
        report.write_failures = result.failures.len();
        for failure in &result.failures {
            warn!(mailbox = %mailbox, id = %failure.id, reason = %failure.reason, "Urgency update not confirmed");
        }
    }
    Ok(report)
}

/// Reconcile every valid mailbox. Per-mailbox errors are logged and skipped.
pub async fn reconcile_urgencies(
    ctx: &ServiceContext,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, PipelineError> {
    let mut total = ReconcileReport::default();

    for mailbox in valid_mailboxes(ctx.store.list_mailboxes().await?) {
        match reconcile_mailbox(ctx.store.as_ref(), &mailbox, now).await {
            Ok(report) => total.absorb(&report),
            Err(e) => error!(mailbox = %mailbox, error = %e, "Urgency reconciliation failed"),
        }
    }

    info!(
        checked = total.checked,
        updated = total.updated,
        invalid = total.invalid_deadlines,
        "Urgency reconciliation complete"
    );
    Ok(total)
}
