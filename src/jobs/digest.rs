//! Daily digest of urgent open tasks, one message per mailbox.

use serde::Serialize;
use tracing::{error, info};

use crate::context::ServiceContext;
use crate::error::PipelineError;
use crate::mailbox::{Mailbox, valid_mailboxes};
use crate::model::{Record, parse_deadline};

pub const DIGEST_SUBJECT: &str = "Urgent Tasks for Today";

const DIGEST_INTRO: &str = "Here are your urgent tasks for today:";
const DIGEST_CLOSING: &str = "Do more with your tasks by launching your SmartTasks add-on!";

/// One row of the digest table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    pub sender: String,
    pub task: String,
    /// Raw stored deadline; formatted at render time.
    pub deadline: Option<String>,
}

/// Urgent open tasks for one mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub mailbox: Mailbox,
    pub entries: Vec<DigestEntry>,
}

impl Digest {
    pub fn from_records(mailbox: Mailbox, records: &[Record]) -> Self {
        let entries = records
            .iter()
            .map(|r| DigestEntry {
                sender: r.sender.clone(),
                task: r.task.clone().unwrap_or_else(|| r.subject.clone()),
                deadline: r.deadline.clone(),
            })
            .collect();
        Self { mailbox, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the digest as an HTML table (Sender / Task / Deadline) between
    /// an intro line and a closing call to action.
    pub fn render_html(&self) -> String {
        let mut rows = String::new();
        for entry in &self.entries {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape_html(&entry.sender),
                escape_html(&entry.task),
                escape_html(&format_deadline(entry.deadline.as_deref())),
            ));
        }

        format!(
            "<html>\n<body>\n<h2>{DIGEST_SUBJECT}</h2>\n\
             <p>{DIGEST_INTRO}</p>\n\
             <table border=\"1\" cellpadding=\"6\" cellspacing=\"0\">\n\
             <tr><th>Sender</th><th>Task</th><th>Deadline</th></tr>\n\
             {rows}</table>\n<p>{DIGEST_CLOSING}</p>\n</body>\n</html>\n"
        )
    }
}

/// Human-readable deadline, e.g. "March 11, 2026".
pub fn format_deadline(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => "No deadline specified".to_string(),
        Some(raw) => match parse_deadline(raw) {
            Ok(dt) => dt.format("%B %d, %Y").to_string(),
            Err(_) => "Invalid deadline format".to_string(),
        },
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Totals from one digest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestReport {
    pub sent: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Send a digest to every valid mailbox with urgent open tasks.
///
/// Read-only against the store. Delivery failures are logged; the next
/// scheduled run is the retry.
pub async fn send_digests(ctx: &ServiceContext) -> Result<DigestReport, PipelineError> {
    let mut report = DigestReport::default();

    for mailbox in valid_mailboxes(ctx.store.list_mailboxes().await?) {
        let records = match ctx.store.urgent_open(&mailbox).await {
            Ok(records) => records,
            Err(e) => {
                report.failed += 1;
                error!(mailbox = %mailbox, error = %e, "Failed to load urgent tasks");
                continue;
            }
        };

        let digest = Digest::from_records(mailbox, &records);
        if digest.is_empty() {
            report.empty += 1;
            info!(mailbox = %digest.mailbox, "No urgent tasks; digest not sent");
            continue;
        }

        match ctx.notifier.notify(&digest).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                report.failed += 1;
                error!(mailbox = %digest.mailbox, error = %e, "Digest delivery failed");
            }
        }
    }

    info!(sent = report.sent, empty = report.empty, failed = report.failed, "Digest run complete");
    Ok(report)
}
