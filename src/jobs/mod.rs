//! Time-driven secondary jobs: urgency reconciliation and the daily digest.
//!
//! Both run from a single task, so they never overlap each other. They only
//! read or re-tier processed records and run alongside the primary workers.

pub mod digest;
pub mod schedule;
pub mod urgency;

pub use digest::{Digest, DigestEntry, DigestReport, send_digests};
pub use schedule::{CronTicker, IntervalTicker, Ticker};
pub use urgency::{ReconcileReport, reconcile_urgencies};

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::context::ServiceContext;

/// Spawn the scheduler task driving both daily jobs.
pub fn spawn_daily_jobs(
    ctx: Arc<ServiceContext>,
    mut reconcile: Box<dyn Ticker>,
    mut digest: Box<dyn Ticker>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Daily job scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Daily job scheduler shutting down");
                    break;
                }
                _ = reconcile.tick() => {
                    if let Err(e) = reconcile_urgencies(&ctx, Utc::now()).await {
                        error!(error = %e, "Urgency reconciliation run failed");
                    }
                }
                _ = digest.tick() => {
                    if let Err(e) = send_digests(&ctx).await {
                        error!(error = %e, "Digest run failed");
                    }
                }
            }
        }
    })
}
