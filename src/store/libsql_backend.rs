//! libSQL backend: async `RecordStore` implementation.
//!
//! Supports local file and in-memory databases. Mailbox partitions are a
//! column on a single `records` table; rowid order is the store-native order.
//! Inserts and successful updates are published on a broadcast change feed.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::mailbox::Mailbox;
use crate::model::{NewRecord, Record, RecordId};
use crate::store::migrations;
use crate::store::traits::{
    BulkWriteResult, ChangeEvent, ChangeKind, RecordStore, WriteFailure, WriteOp,
};

/// Capacity of the change-feed broadcast buffer.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// libSQL record store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    changes: broadcast::Sender<ChangeEvent>,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        store.init_schema().await?;
        info!(path = %path.display(), "Record store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db)?;
        store.init_schema().await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            db: Arc::new(db),
            conn,
            changes,
        })
    }

    /// Get the connection.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn publish(&self, mailbox: &Mailbox, id: &RecordId, kind: ChangeKind) {
        // No subscribers is not an error: the scanner still sees the record.
        let _ = self.changes.send(ChangeEvent {
            mailbox: mailbox.to_string(),
            record_id: id.clone(),
            kind,
        });
    }

    async fn query_records(
        &self,
        label: &str,
        sql: &str,
        args: impl libsql::params::IntoParams,
    ) -> Result<Vec<Record>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, args)
            .await
            .map_err(|e| DatabaseError::Query(format!("{label}: {e}")))?;

        let mut records = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match row_to_record(&row) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!("Skipping record row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{label}: {e}"))),
            }
        }
        Ok(records)
    }

    async fn apply_op(&self, mailbox: &Mailbox, op: &WriteOp) -> Result<u64, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let result = match op {
            WriteOp::Commit { id, update } => {
                conn.execute(
                    "UPDATE records SET processed = ?1, task = ?2, deadline = ?3, urgency_tier = ?4,
                        has_task = ?5, completed = CASE WHEN completed = 1 THEN 1 ELSE ?6 END,
                        updated_at = ?7
                     WHERE id = ?8 AND mailbox = ?9",
                    params![
                        update.processed as i64,
                        opt_text_owned(update.task.clone()),
                        opt_text_owned(update.deadline.map(|d| d.to_rfc3339())),
                        update.urgency_tier.as_str(),
                        update.has_task as i64,
                        update.completed as i64,
                        now,
                        id.as_str(),
                        mailbox.as_str(),
                    ],
                )
                .await
            }
            WriteOp::SetUrgency { id, tier } => {
                conn.execute(
                    "UPDATE records SET urgency_tier = ?1, updated_at = ?2
                     WHERE id = ?3 AND mailbox = ?4 AND processed = 1",
                    params![tier.as_str(), now, id.as_str(), mailbox.as_str()],
                )
                .await
            }
            WriteOp::Delete { id } => {
                conn.execute(
                    "DELETE FROM records WHERE id = ?1 AND mailbox = ?2",
                    params![id.as_str(), mailbox.as_str()],
                )
                .await
            }
        };
        result.map_err(map_write_error)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn map_write_error(e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(message)
    } else {
        DatabaseError::Query(message)
    }
}

const RECORD_COLUMNS: &str = "id, mailbox, correlation_key, sender, subject, body, received_at, processed, task, deadline, urgency_tier, has_task, completed";

/// Map a libsql Row to a Record. Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<Record, libsql::Error> {
    let received_str: String = row.get(6)?;
    let processed: i64 = row.get(7)?;
    let has_task: i64 = row.get(11)?;
    let completed: i64 = row.get(12)?;
    let urgency_tier = row
        .get::<String>(10)
        .ok()
        .and_then(|s| s.parse().ok());

    Ok(Record {
        id: RecordId(row.get(0)?),
        mailbox: row.get(1)?,
        correlation_key: row.get::<String>(2).ok().filter(|k| !k.is_empty()),
        sender: row.get(3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        received_at: parse_datetime(&received_str),
        processed: processed != 0,
        task: row.get(8).ok(),
        deadline: row.get(9).ok(),
        urgency_tier,
        has_task: has_task != 0,
        completed: completed != 0,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl RecordStore for LibSqlStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn list_mailboxes(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT DISTINCT mailbox FROM records ORDER BY mailbox", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_mailboxes: {e}")))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_mailboxes: {e}")))?
        {
            let name = row
                .get::<String>(0)
                .map_err(|e| DatabaseError::Query(format!("list_mailboxes: {e}")))?;
            names.push(name);
        }
        Ok(names)
    }

    async fn insert_record(
        &self,
        mailbox: &Mailbox,
        record: &NewRecord,
    ) -> Result<RecordId, DatabaseError> {
        let id = RecordId::new();
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO records (id, mailbox, correlation_key, sender, subject, body,
                    received_at, processed, has_task, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 0, ?8, ?8)",
                params![
                    id.as_str(),
                    mailbox.as_str(),
                    opt_text(record.correlation_key.as_deref()),
                    record.sender.as_str(),
                    record.subject.as_str(),
                    record.body.as_str(),
                    record.received_at.to_rfc3339(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_record: {e}")))?;

        debug!(mailbox = %mailbox, id = %id, "Record staged");
        self.publish(mailbox, &id, ChangeKind::Insert);
        Ok(id)
    }

    async fn set_completed(
        &self,
        mailbox: &Mailbox,
        id: &RecordId,
        completed: bool,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE records SET completed = ?1, updated_at = ?2 WHERE id = ?3 AND mailbox = ?4",
                params![completed as i64, now, id.as_str(), mailbox.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_completed: {e}")))?;

        if count > 0 {
            self.publish(mailbox, id, ChangeKind::Update);
        }
        Ok(count > 0)
    }

    async fn get_record(
        &self,
        mailbox: &Mailbox,
        id: &RecordId,
    ) -> Result<Option<Record>, DatabaseError> {
        let mut records = self
            .query_records(
                "get_record",
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1 AND mailbox = ?2"),
                params![id.as_str(), mailbox.as_str()],
            )
            .await?;
        Ok(records.pop())
    }

    async fn list_records(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            "list_records",
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE mailbox = ?1 ORDER BY rowid ASC"),
            params![mailbox.as_str()],
        )
        .await
    }

    async fn fetch_unprocessed(
        &self,
        mailbox: &Mailbox,
        limit: usize,
    ) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            "fetch_unprocessed",
            &format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE mailbox = ?1 AND processed = 0
                   AND correlation_key IS NOT NULL AND correlation_key != ''
                 ORDER BY rowid ASC LIMIT ?2"
            ),
            params![mailbox.as_str(), limit as i64],
        )
        .await
    }

    async fn unkeyed_unprocessed(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            "unkeyed_unprocessed",
            &format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE mailbox = ?1 AND processed = 0
                   AND (correlation_key IS NULL OR correlation_key = '')
                 ORDER BY rowid ASC"
            ),
            params![mailbox.as_str()],
        )
        .await
    }

    async fn shadowed_unprocessed(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            "shadowed_unprocessed",
            &format!(
                "SELECT {RECORD_COLUMNS} FROM records u
                 WHERE u.mailbox = ?1 AND u.processed = 0 AND u.correlation_key IS NOT NULL
                   AND EXISTS (
                       SELECT 1 FROM records p
                       WHERE p.mailbox = u.mailbox AND p.processed = 1
                         AND p.correlation_key = u.correlation_key
                   )
                 ORDER BY u.rowid ASC"
            ),
            params![mailbox.as_str()],
        )
        .await
    }

    async fn open_with_deadline(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            "open_with_deadline",
            &format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE mailbox = ?1 AND processed = 1 AND completed = 0
                   AND deadline IS NOT NULL AND deadline != ''
                 ORDER BY rowid ASC"
            ),
            params![mailbox.as_str()],
        )
        .await
    }

    async fn urgent_open(&self, mailbox: &Mailbox) -> Result<Vec<Record>, DatabaseError> {
        self.query_records(
            "urgent_open",
            &format!(
                "SELECT {RECORD_COLUMNS} FROM records
                 WHERE mailbox = ?1 AND urgency_tier = 'Urgent' AND processed = 1 AND completed = 0
                 ORDER BY rowid ASC"
            ),
            params![mailbox.as_str()],
        )
        .await
    }

    async fn bulk_write(
        &self,
        mailbox: &Mailbox,
        ops: &[WriteOp],
    ) -> Result<BulkWriteResult, DatabaseError> {
        let mut result = BulkWriteResult::default();

        for op in ops {
            match self.apply_op(mailbox, op).await {
                Ok(0) => result.unmatched += 1,
                Ok(_) => match op {
                    WriteOp::Delete { .. } => result.deleted += 1,
                    WriteOp::Commit { id, .. } | WriteOp::SetUrgency { id, .. } => {
                        result.modified += 1;
                        self.publish(mailbox, id, ChangeKind::Update);
                    }
                },
                Err(e) => result.failures.push(WriteFailure {
                    id: op.id().clone(),
                    op: op.label(),
                    reason: e.to_string(),
                }),
            }
        }

        debug!(
            mailbox = %mailbox,
            ops = ops.len(),
            modified = result.modified,
            deleted = result.deleted,
            unmatched = result.unmatched,
            failed = result.failures.len(),
            "Bulk write applied"
        );
        Ok(result)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordUpdate, UrgencyTier};

    async fn test_store() -> LibSqlStore {
        LibSqlStore::new_memory().await.unwrap()
    }

    fn mailbox() -> Mailbox {
        Mailbox::parse("alice@example.com").unwrap()
    }

    fn new_record(key: Option<&str>, subject: &str) -> NewRecord {
        NewRecord::new(key, "bob@example.com", subject, "body text", Utc::now())
    }

    fn commit_update(tier: UrgencyTier) -> RecordUpdate {
        RecordUpdate {
            processed: true,
            task: Some("Do it".into()),
            deadline: None,
            urgency_tier: tier,
            has_task: true,
            completed: false,
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = test_store().await;
        let mb = mailbox();
        let id = store
            .insert_record(&mb, &new_record(Some("k1"), "Hello"))
            .await
            .unwrap();

        let rec = store.get_record(&mb, &id).await.unwrap().unwrap();
        assert_eq!(rec.correlation_key.as_deref(), Some("k1"));
        assert_eq!(rec.subject, "Hello");
        assert!(!rec.processed);
        assert!(!rec.completed);
        assert!(rec.urgency_tier.is_none());
        assert!(rec.task.is_none());
    }

    #[tokio::test]
    async fn get_record_is_scoped_to_mailbox() {
        let store = test_store().await;
        let id = store
            .insert_record(&mailbox(), &new_record(Some("k1"), "Hello"))
            .await
            .unwrap();
        let other = Mailbox::parse("carol@example.com").unwrap();
        assert!(store.get_record(&other, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_mailboxes_distinct_sorted() {
        let store = test_store().await;
        let b = Mailbox::parse("bob@example.com").unwrap();
        store.insert_record(&b, &new_record(Some("1"), "x")).await.unwrap();
        store.insert_record(&mailbox(), &new_record(Some("2"), "y")).await.unwrap();
        store.insert_record(&b, &new_record(Some("3"), "z")).await.unwrap();

        let names = store.list_mailboxes().await.unwrap();
        assert_eq!(names, vec!["alice@example.com", "bob@example.com"]);
    }

    #[tokio::test]
    async fn list_mailboxes_reports_unreadable_rows() {
        let store = test_store().await;
        store.insert_record(&mailbox(), &new_record(Some("1"), "x")).await.unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO records (id, mailbox, correlation_key, sender, subject, body, received_at)
                 VALUES ('blob-1', X'00FF', 'z', 's', 'subj', 'body', '2026-01-01T00:00:00Z')",
                (),
            )
            .await
            .unwrap();

        let err = store.list_mailboxes().await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn fetch_unprocessed_respects_order_and_limit() {
        let store = test_store().await;
        let mb = mailbox();
        for i in 0..5 {
            store
                .insert_record(&mb, &new_record(Some(&format!("k{i}")), &format!("S{i}")))
                .await
                .unwrap();
        }

        let batch = store.fetch_unprocessed(&mb, 3).await.unwrap();
        let subjects: Vec<&str> = batch.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["S0", "S1", "S2"]);
    }

    #[tokio::test]
    async fn keyless_records_are_kept_out_of_batches() {
        let store = test_store().await;
        let mb = mailbox();
        store.insert_record(&mb, &new_record(None, "first")).await.unwrap();
        store.insert_record(&mb, &new_record(None, "second")).await.unwrap();
        store.insert_record(&mb, &new_record(Some("k1"), "keyed")).await.unwrap();

        let batch = store.fetch_unprocessed(&mb, 1).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].subject, "keyed");

        let unkeyed = store.unkeyed_unprocessed(&mb).await.unwrap();
        let subjects: Vec<&str> = unkeyed.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn commit_marks_processed_and_sets_fields() {
        let store = test_store().await;
        let mb = mailbox();
        let id = store.insert_record(&mb, &new_record(Some("k1"), "S")).await.unwrap();

        let result = store
            .bulk_write(
                &mb,
                &[WriteOp::Commit {
                    id: id.clone(),
                    update: commit_update(UrgencyTier::SomewhatUrgent),
                }],
            )
            .await
            .unwrap();
        assert_eq!(result.modified, 1);
        assert!(result.is_clean());

        let rec = store.get_record(&mb, &id).await.unwrap().unwrap();
        assert!(rec.processed);
        assert!(rec.has_task);
        assert_eq!(rec.task.as_deref(), Some("Do it"));
        assert_eq!(rec.urgency_tier, Some(UrgencyTier::SomewhatUrgent));
        assert!(store.fetch_unprocessed(&mb, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_never_reverts_completed() {
        let store = test_store().await;
        let mb = mailbox();
        let id = store.insert_record(&mb, &new_record(Some("k1"), "S")).await.unwrap();
        store.set_completed(&mb, &id, true).await.unwrap();

        store
            .bulk_write(
                &mb,
                &[WriteOp::Commit {
                    id: id.clone(),
                    update: commit_update(UrgencyTier::Urgent),
                }],
            )
            .await
            .unwrap();

        let rec = store.get_record(&mb, &id).await.unwrap().unwrap();
        assert!(rec.processed);
        assert!(rec.completed);
    }

    #[tokio::test]
    async fn second_processed_copy_is_reported_as_failure() {
        let store = test_store().await;
        let mb = mailbox();
        let first = store.insert_record(&mb, &new_record(Some("dup"), "A")).await.unwrap();
        let second = store.insert_record(&mb, &new_record(Some("dup"), "B")).await.unwrap();
        let third = store.insert_record(&mb, &new_record(Some("other"), "C")).await.unwrap();

        let ops = vec![
            WriteOp::Commit { id: first.clone(), update: commit_update(UrgencyTier::NotUrgent) },
            WriteOp::Commit { id: second.clone(), update: commit_update(UrgencyTier::NotUrgent) },
            WriteOp::Commit { id: third.clone(), update: commit_update(UrgencyTier::NotUrgent) },
        ];
        let result = store.bulk_write(&mb, &ops).await.unwrap();

        // Non-atomic: the third op still applies after the second fails.
        assert_eq!(result.modified, 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].id, second);
        assert_eq!(result.failures[0].op, "commit");
        assert!(!store.get_record(&mb, &second).await.unwrap().unwrap().processed);
        assert!(store.get_record(&mb, &third).await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn delete_and_unmatched_counts() {
        let store = test_store().await;
        let mb = mailbox();
        let id = store.insert_record(&mb, &new_record(Some("k"), "S")).await.unwrap();

        let result = store
            .bulk_write(
                &mb,
                &[
                    WriteOp::Delete { id: id.clone() },
                    WriteOp::Delete { id: id.clone() },
                ],
            )
            .await
            .unwrap();
        assert_eq!(result.deleted, 1);
        assert_eq!(result.unmatched, 1);
        assert!(store.get_record(&mb, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_urgency_only_touches_processed_records() {
        let store = test_store().await;
        let mb = mailbox();
        let id = store.insert_record(&mb, &new_record(Some("k"), "S")).await.unwrap();

        let result = store
            .bulk_write(&mb, &[WriteOp::SetUrgency { id: id.clone(), tier: UrgencyTier::Urgent }])
            .await
            .unwrap();
        assert_eq!(result.unmatched, 1);
        assert!(store.get_record(&mb, &id).await.unwrap().unwrap().urgency_tier.is_none());
    }

    #[tokio::test]
    async fn shadowed_unprocessed_finds_only_keyed_twins() {
        let store = test_store().await;
        let mb = mailbox();
        let processed = store.insert_record(&mb, &new_record(Some("k1"), "P")).await.unwrap();
        let twin = store.insert_record(&mb, &new_record(Some("k1"), "T")).await.unwrap();
        store.insert_record(&mb, &new_record(Some("k2"), "Lonely")).await.unwrap();
        store.insert_record(&mb, &new_record(None, "Keyless")).await.unwrap();

        store
            .bulk_write(
                &mb,
                &[WriteOp::Commit { id: processed, update: commit_update(UrgencyTier::NotUrgent) }],
            )
            .await
            .unwrap();

        let shadowed = store.shadowed_unprocessed(&mb).await.unwrap();
        assert_eq!(shadowed.len(), 1);
        assert_eq!(shadowed[0].id, twin);
    }

    #[tokio::test]
    async fn urgent_open_filters_completed_and_tier() {
        let store = test_store().await;
        let mb = mailbox();
        let urgent = store.insert_record(&mb, &new_record(Some("1"), "Urgent")).await.unwrap();
        let done = store.insert_record(&mb, &new_record(Some("2"), "Done")).await.unwrap();
        let calm = store.insert_record(&mb, &new_record(Some("3"), "Calm")).await.unwrap();

        store
            .bulk_write(
                &mb,
                &[
                    WriteOp::Commit { id: urgent.clone(), update: commit_update(UrgencyTier::Urgent) },
                    WriteOp::Commit { id: done.clone(), update: commit_update(UrgencyTier::Urgent) },
                    WriteOp::Commit { id: calm, update: commit_update(UrgencyTier::NotUrgent) },
                ],
            )
            .await
            .unwrap();
        store.set_completed(&mb, &done, true).await.unwrap();

        let open = store.urgent_open(&mb).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, urgent);
    }

    #[tokio::test]
    async fn change_feed_publishes_insert_and_update() {
        let store = test_store().await;
        let mb = mailbox();
        let mut rx = store.subscribe();

        let id = store.insert_record(&mb, &new_record(Some("k"), "S")).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record_id, id);
        assert_eq!(event.mailbox, "alice@example.com");

        store
            .bulk_write(
                &mb,
                &[WriteOp::Commit { id: id.clone(), update: commit_update(UrgencyTier::Urgent) }],
            )
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);

        // Deletes are not published.
        store.bulk_write(&mb, &[WriteOp::Delete { id }]).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("triage.db");
        let store = LibSqlStore::new_local(&db_path).await.unwrap();
        store
            .insert_record(&mailbox(), &new_record(Some("k"), "S"))
            .await
            .unwrap();
        assert!(db_path.exists());
    }
}
