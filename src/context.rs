//! Service context: the handles every worker shares, built once at startup.

use std::sync::Arc;

use crate::classifier::Classifier;
use crate::config::PipelineSettings;
use crate::notify::Notifier;
use crate::store::RecordStore;

/// Shared dependencies passed to the scanner, watcher and daily jobs.
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn RecordStore>,
    pub classifier: Arc<dyn Classifier>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: PipelineSettings,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn RecordStore>,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            classifier,
            notifier,
            settings,
        }
    }
}
