//! Worker supervisor: spawns the scanner, the watcher and the daily jobs.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ScheduleConfig;
use crate::context::ServiceContext;
use crate::error::ConfigError;
use crate::jobs::{CronTicker, spawn_daily_jobs};
use crate::pipeline::{spawn_batch_scanner, spawn_change_watcher};

/// Handles for every long-running task. Cancel `token` to stop them all.
pub struct Workers {
    pub token: CancellationToken,
    pub handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Cancel every worker and wait for each to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                tracing::error!("Worker task panicked: {e}");
            }
        }
        info!("All workers stopped");
    }
}

/// Spawn all workers under child tokens of `parent`.
pub fn spawn_workers(
    ctx: Arc<ServiceContext>,
    schedule: &ScheduleConfig,
    parent: &CancellationToken,
) -> Result<Workers, ConfigError> {
    let reconcile = CronTicker::new(&schedule.reconcile_cron)?;
    let digest = CronTicker::new(&schedule.digest_cron)?;
    let shutdown = parent.child_token();

    let handles = vec![
        spawn_batch_scanner(Arc::clone(&ctx), shutdown.child_token()),
        spawn_change_watcher(Arc::clone(&ctx), shutdown.child_token()),
        spawn_daily_jobs(
            ctx,
            Box::new(reconcile),
            Box::new(digest),
            shutdown.child_token(),
        ),
    ];
    info!(
        reconcile = %schedule.reconcile_cron,
        digest = %schedule.digest_cron,
        "Workers started"
    );

    Ok(Workers {
        token: shutdown,
        handles,
    })
}
