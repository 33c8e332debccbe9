//! Message classification: the verdict every record is committed with.
//!
//! Two implementations:
//! - **KeywordClassifier**: in-process, deterministic phrase matching (default)
//! - **HttpClassifier**: delegates to a remote model over JSON/HTTP

pub mod http;
pub mod keyword;

pub use http::HttpClassifier;
pub use keyword::KeywordClassifier;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::model::{Record, UrgencyTier};

/// Input to a classifier call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Relative dates in the message resolve against this instant.
    pub reference_time: DateTime<Utc>,
}

impl ClassifyRequest {
    /// Build a request from a staged record, anchored at its receipt time.
    pub fn from_record(record: &Record) -> Self {
        Self {
            sender: record.sender.clone(),
            subject: record.subject.clone(),
            body: record.body.clone(),
            reference_time: record.received_at,
        }
    }
}

/// Classifier output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_task: bool,
    pub urgency: UrgencyTier,
    pub deadline: Option<DateTime<Utc>>,
}

/// A message classifier. Must be deterministic for fixed inputs.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    async fn classify(&self, request: &ClassifyRequest) -> Result<Verdict, ClassifyError>;
}

/// Create the configured classifier: remote when a URL is set, keyword otherwise.
pub fn create_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>, ClassifyError> {
    match &config.url {
        Some(url) => {
            tracing::info!(url = %url, "Using remote classifier");
            Ok(Arc::new(HttpClassifier::new(url.clone(), config.timeout)?))
        }
        None => {
            tracing::info!("Using built-in keyword classifier");
            Ok(Arc::new(KeywordClassifier::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn create_classifier_defaults_to_keyword() {
        let classifier = create_classifier(&ClassifierConfig::default()).unwrap();
        assert_eq!(classifier.name(), "keyword");
    }

    #[test]
    fn create_classifier_uses_url() {
        let config = ClassifierConfig {
            url: Some("http://localhost:9/classify".into()),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(create_classifier(&config).unwrap().name(), "http");
    }

    #[test]
    fn request_anchors_on_receipt_time() {
        use chrono::TimeZone;

        let received = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let record = Record {
            id: crate::model::RecordId::new(),
            mailbox: "alice@example.com".into(),
            correlation_key: Some("k".into()),
            sender: "bob@example.com".into(),
            subject: "S".into(),
            body: "B".into(),
            received_at: received,
            processed: false,
            task: None,
            deadline: None,
            urgency_tier: None,
            has_task: false,
            completed: false,
        };
        let request = ClassifyRequest::from_record(&record);
        assert_eq!(request.reference_time, received);
        assert_eq!(request.subject, "S");
    }
}
