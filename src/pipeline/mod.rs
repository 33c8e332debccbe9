//! Dual-path ingestion pipeline.
//!
//! Unprocessed records reach the shared commit path two ways:
//! 1. `scanner`: periodic bounded batch per mailbox, followed by the dedup sweep
//! 2. `watcher`: live change-feed notifications, one record at a time
//!
//! There are no locks between the two. Correctness rests on the commit path
//! being idempotent and on the sweep removing shadowed duplicates.

pub mod commit;
pub mod dedup;
pub mod scanner;
pub mod watcher;

pub use commit::{build_update, classify_record, commit_record};
pub use dedup::{BatchPlan, reconcile_sweep, resolve_batch};
pub use scanner::{ScanReport, scan_all, scan_mailbox, spawn_batch_scanner};
pub use watcher::{WatchOutcome, handle_change, spawn_change_watcher};
