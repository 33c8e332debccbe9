//! Record data model: staged messages, urgency tiers, and classification updates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Store-assigned record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-level urgency. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UrgencyTier {
    #[serde(rename = "Not Urgent")]
    NotUrgent,
    #[serde(rename = "Somewhat Urgent")]
    SomewhatUrgent,
    Urgent,
}

impl UrgencyTier {
    /// Numeric level used on the classifier wire (1..=3).
    pub fn level(self) -> u8 {
        match self {
            Self::NotUrgent => 1,
            Self::SomewhatUrgent => 2,
            Self::Urgent => 3,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::NotUrgent),
            2 => Some(Self::SomewhatUrgent),
            3 => Some(Self::Urgent),
            _ => None,
        }
    }

    /// Tier implied purely by how many whole days remain before a deadline.
    pub fn from_days_until(days: i64) -> Self {
        if days <= 3 {
            Self::Urgent
        } else if days <= 7 {
            Self::SomewhatUrgent
        } else {
            Self::NotUrgent
        }
    }

    /// Display string persisted in the store.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotUrgent => "Not Urgent",
            Self::SomewhatUrgent => "Somewhat Urgent",
            Self::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Urgent" => Ok(Self::NotUrgent),
            "Somewhat Urgent" => Ok(Self::SomewhatUrgent),
            "Urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown urgency tier: {other}")),
        }
    }
}

/// A message record as staged by the upstream ingester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Raw partition name the record lives in.
    pub mailbox: String,
    /// External identifier of the source message. Absent means malformed.
    pub correlation_key: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub task: Option<String>,
    /// Stored as text: upstream writers may leave naive or malformed values.
    pub deadline: Option<String>,
    pub urgency_tier: Option<UrgencyTier>,
    pub has_task: bool,
    pub completed: bool,
}

/// Fields supplied when staging a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub correlation_key: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl NewRecord {
    pub fn new(
        correlation_key: Option<&str>,
        sender: &str,
        subject: &str,
        body: &str,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_key: correlation_key.map(String::from),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            received_at,
        }
    }
}

/// The `$set` payload written when a record is classified.
///
/// Built deterministically from the record and the classifier verdict, so
/// applying it twice leaves the record in the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub processed: bool,
    pub task: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub urgency_tier: UrgencyTier,
    pub has_task: bool,
    /// Re-asserted as `false`; the store never lowers a stored `true`.
    pub completed: bool,
}

/// Parse a stored deadline, normalising naive values to UTC.
///
/// Accepts RFC 3339 (offset-aware), naive `T`- or space-separated date-times,
/// and bare dates (midnight).
pub fn parse_deadline(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(ndt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        && let Some(ndt) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(ndt.and_utc());
    }
    Err(PipelineError::DeadlineParse {
        value: raw.to_string(),
        reason: "not an RFC 3339, naive date-time, or YYYY-MM-DD value".into(),
    })
}
