//! Change-feed watcher: classifies records as soon as they are staged.
//!
//! Every insert/update notification is re-read from the store; only records
//! that still exist, are unprocessed and carry a correlation key go through the
//! commit path. The feed is store-wide, so mailboxes created after startup
//! need no extra subscription. A lagging subscription is logged and skipped,
//! the batch scanner picks up whatever was missed.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ServiceContext;
use crate::error::PipelineError;
use crate::mailbox::Mailbox;
use crate::pipeline::commit::commit_record;
use crate::store::ChangeEvent;

/// What the watcher did with one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Committed,
    /// Record was deleted before it could be re-read.
    Missing,
    AlreadyProcessed,
    Malformed,
    /// Partition name is not an email address.
    InvalidMailbox,
}

/// Handle a single change notification.
pub async fn handle_change(
    ctx: &ServiceContext,
    event: &ChangeEvent,
) -> Result<WatchOutcome, PipelineError> {
    let Some(mailbox) = Mailbox::parse(&event.mailbox) else {
        debug!(partition = %event.mailbox, "Ignoring change in invalid mailbox");
        return Ok(WatchOutcome::InvalidMailbox);
    };

    let Some(record) = ctx.store.get_record(&mailbox, &event.record_id).await? else {
        return Ok(WatchOutcome::Missing);
    };
    if record.processed {
        return Ok(WatchOutcome::AlreadyProcessed);
    }
    if record.correlation_key.is_none() {
        warn!(mailbox = %mailbox, id = %record.id, "Skipping record without correlation key");
        return Ok(WatchOutcome::Malformed);
    }

    commit_record(
        ctx.store.as_ref(),
        ctx.classifier.as_ref(),
        &mailbox,
        &record,
    )
    .await?;
    info!(mailbox = %mailbox, id = %record.id, "Record processed from change feed");
    Ok(WatchOutcome::Committed)
}

/// Spawn the change-feed watcher. Runs until cancelled or the feed closes.
pub fn spawn_change_watcher(ctx: Arc<ServiceContext>, shutdown: CancellationToken) -> JoinHandle<()> {
    // Subscribe before spawning so nothing staged after this call is missed.
    let mut rx = ctx.store.subscribe();

    tokio::spawn(async move {
        info!("Change-feed watcher started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Change-feed watcher shutting down");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => match handle_change(&ctx, &event).await {
                            Ok(outcome) => debug!(id = %event.record_id, ?outcome, "Change handled"),
                            Err(e) => warn!(
                                mailbox = %event.mailbox,
                                id = %event.record_id,
                                error = %e,
                                "Change-feed commit failed; batch scanner will retry"
                            ),
                        },
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(missed = n, "Change-feed watcher lagged behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("Change feed closed");
                            break;
                        }
                    }
                }
            }
        }
    })
}
