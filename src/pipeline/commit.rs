//! Shared classify → build-update → commit path.
//!
//! Both the batch scanner and the change-feed watcher go through here, so a
//! record classified twice produces the same update both times.

use tracing::debug;

use crate::classifier::{ClassifyRequest, Classifier, Verdict};
use crate::error::PipelineError;
use crate::mailbox::Mailbox;
use crate::model::{Record, RecordUpdate};
use crate::store::{RecordStore, WriteOp};

/// Build the update payload for a record from a classifier verdict.
pub fn build_update(record: &Record, verdict: &Verdict) -> RecordUpdate {
    RecordUpdate {
        processed: true,
        task: verdict.is_task.then(|| record.subject.clone()),
        deadline: verdict.deadline,
        urgency_tier: verdict.urgency,
        has_task: verdict.is_task,
        completed: false,
    }
}

/// Classify a well-formed record. Keyless records are rejected before the
/// classifier is called.
pub async fn classify_record(
    classifier: &dyn Classifier,
    record: &Record,
) -> Result<RecordUpdate, PipelineError> {
    if record.correlation_key.is_none() {
        return Err(PipelineError::MalformedRecord {
            id: record.id.to_string(),
        });
    }

    let verdict = classifier
        .classify(&ClassifyRequest::from_record(record))
        .await?;
    debug!(
        id = %record.id,
        classifier = classifier.name(),
        is_task = verdict.is_task,
        urgency = %verdict.urgency,
        "Record classified"
    );
    Ok(build_update(record, &verdict))
}

/// Classify one record and commit it with a single-op write.
pub async fn commit_record(
    store: &dyn RecordStore,
    classifier: &dyn Classifier,
    mailbox: &Mailbox,
    record: &Record,
) -> Result<RecordUpdate, PipelineError> {
    let update = classify_record(classifier, record).await?;

    let op = WriteOp::Commit {
        id: record.id.clone(),
        update: update.clone(),
    };
    let result = store.bulk_write(mailbox, std::slice::from_ref(&op)).await?;

    if let Some(failure) = result.failures.into_iter().next() {
        return Err(PipelineError::WriteFailed {
            id: failure.id.to_string(),
            reason: failure.reason,
        });
    }
    if result.modified == 0 {
        return Err(PipelineError::WriteFailed {
            id: record.id.to_string(),
            reason: "record no longer exists".into(),
        });
    }
    Ok(update)
}
