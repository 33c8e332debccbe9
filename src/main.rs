use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use inbox_triage::classifier::create_classifier;
use inbox_triage::config::TriageConfig;
use inbox_triage::context::ServiceContext;
use inbox_triage::notify::SmtpNotifier;
use inbox_triage::service::spawn_workers;
use inbox_triage::store::{LibSqlStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = match TriageConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  Required: TRIAGE_DB_PATH, TRIAGE_EMAIL_ADDRESS, TRIAGE_EMAIL_PASSKEY");
            std::process::exit(1);
        }
    };

    // Keep the file writer's guard alive for the whole process.
    let _log_guard = init_tracing(&config);

    eprintln!("📬 Inbox Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {}", config.db_path.display());
    eprintln!(
        "   Scan: every {}s, batch {}",
        config.pipeline.scan_interval.as_secs(),
        config.pipeline.batch_size
    );

    let store = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .context("Failed to open record store")?,
    );
    let mailboxes = store.list_mailboxes().await?;
    tracing::info!(mailboxes = mailboxes.len(), "Record store ready");

    let classifier = create_classifier(&config.classifier).context("Failed to create classifier")?;
    let notifier = Arc::new(SmtpNotifier::new(config.smtp.clone()));

    let ctx = Arc::new(ServiceContext::new(
        store,
        classifier,
        notifier,
        config.pipeline.clone(),
    ));

    let root = CancellationToken::new();
    let workers = spawn_workers(ctx, &config.schedule, &root).context("Invalid schedule")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");

    workers.shutdown().await;
    Ok(())
}

/// Console logging, plus a daily-rolling file when `TRIAGE_LOG_DIR` is set.
fn init_tracing(config: &TriageConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut log_guard = None;
    let file_layer = config.log_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, "inbox-triage.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        log_guard = Some(guard);
        tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    log_guard
}
