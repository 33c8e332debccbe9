//! Batch scanner: periodic full pass over every mailbox.
//!
//! Each tick, per valid mailbox:
//! 1. Fetch up to `batch_size` keyed, unprocessed records in store order
//! 2. Resolve in-batch duplicates; keyless records are reported and left in place
//! 3. Classify the rest and submit commits + deletes as one bulk write
//! 4. Run the reconciliation sweep
//!
//! Failures are logged and the affected records stay unprocessed for the next tick.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::ServiceContext;
use crate::error::PipelineError;
use crate::mailbox::{Mailbox, valid_mailboxes};
use crate::model::RecordId;
use crate::pipeline::commit::classify_record;
use crate::pipeline::dedup::{reconcile_sweep, resolve_batch};
use crate::store::WriteOp;

/// Outcome of one scan over one mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub mailbox: String,
    pub fetched: usize,
    pub committed: usize,
    pub duplicates_deleted: usize,
    pub malformed: usize,
    pub classify_failures: usize,
    pub write_failures: usize,
    pub swept: usize,
}

impl ScanReport {
    fn is_idle(&self) -> bool {
        self.fetched == 0 && self.swept == 0
    }
}

/// Run one scan cycle over a single mailbox.
pub async fn scan_mailbox(
    ctx: &ServiceContext,
    mailbox: &Mailbox,
) -> Result<ScanReport, PipelineError> {
    let mut report = ScanReport {
        mailbox: mailbox.to_string(),
        ..Default::default()
    };

    let batch = ctx
        .store
        .fetch_unprocessed(mailbox, ctx.settings.batch_size)
        .await?;
    report.fetched = batch.len();

    // Keyless records are fetched separately so they never fill the batch.
    let mut malformed: Vec<RecordId> = ctx
        .store
        .unkeyed_unprocessed(mailbox)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let plan = resolve_batch(batch);
    malformed.extend(plan.malformed);
    report.malformed = malformed.len();
    for id in &malformed {
        warn!(mailbox = %mailbox, id = %id, "Skipping record without correlation key");
    }

    let mut ops: Vec<WriteOp> = plan
        .duplicates
        .into_iter()
        .map(|id| WriteOp::Delete { id })
        .collect();

    for record in &plan.to_commit {
        match classify_record(ctx.classifier.as_ref(), record).await {
            Ok(update) => ops.push(WriteOp::Commit {
                id: record.id.clone(),
                update,
            }),
            Err(e) => {
                report.classify_failures += 1;
                warn!(mailbox = %mailbox, id = %record.id, error = %e, "Classification failed; will retry next scan");
            }
        }
    }

    if !ops.is_empty() {
        let result = ctx.store.bulk_write(mailbox, &ops).await?;
        report.committed = result.modified;
        report.duplicates_deleted = result.deleted;
        report.write_failures = result.failures.len();
        for failure in &result.failures {
            warn!(
                mailbox = %mailbox,
                id = %failure.id,
                op = failure.op,
                reason = %failure.reason,
                "Bulk write op not confirmed"
            );
        }
    }

    report.swept = reconcile_sweep(ctx.store.as_ref(), mailbox).await?;
    Ok(report)
}

/// Scan every valid mailbox once. Per-mailbox errors are logged and skipped.
pub async fn scan_all(ctx: &ServiceContext) -> Result<Vec<ScanReport>, PipelineError> {
    let mailboxes = valid_mailboxes(ctx.store.list_mailboxes().await?);

    let mut reports = Vec::with_capacity(mailboxes.len());
    for mailbox in &mailboxes {
        match scan_mailbox(ctx, mailbox).await {
            Ok(report) => {
                if report.is_idle() {
                    debug!(mailbox = %mailbox, "Nothing to scan");
                } else {
                    info!(
                        mailbox = %mailbox,
                        fetched = report.fetched,
                        committed = report.committed,
                        duplicates = report.duplicates_deleted,
                        malformed = report.malformed,
                        classify_failures = report.classify_failures,
                        write_failures = report.write_failures,
                        swept = report.swept,
                        "Scan complete"
                    );
                }
                reports.push(report);
            }
            Err(e) => error!(mailbox = %mailbox, error = %e, "Scan failed"),
        }
    }
    Ok(reports)
}

/// Spawn the batch scanner loop. Scans immediately, then every `scan_interval`.
pub fn spawn_batch_scanner(ctx: Arc<ServiceContext>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = ctx.settings.scan_interval;
        info!(
            batch_size = ctx.settings.batch_size,
            "Batch scanner started (interval: {}s)",
            period.as_secs()
        );

        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Batch scanner shutting down");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = scan_all(&ctx).await {
                        error!(error = %e, "Batch scan cycle failed");
                    }
                }
            }
        }
    })
}
