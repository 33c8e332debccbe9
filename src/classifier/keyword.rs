//! Built-in keyword classifier.
//!
//! Flags a message as a task when it contains a task keyword or a request cue,
//! scores urgency from phrasing, and pulls the earliest date it can recognise
//! as the deadline. Final urgency is the higher of the phrase tier and the tier
//! implied by the deadline's distance from the reference time.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::debug;

use crate::classifier::{ClassifyRequest, Classifier, Verdict};
use crate::error::ClassifyError;
use crate::model::UrgencyTier;

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(assignment|task|deadline|as soon as possible|asap)\b")
        .expect("valid task regex")
});

static REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\bplease (submit|send|review|complete|finish|prepare|confirm)\b|\bdue\b|\baction required\b)",
    )
    .expect("valid request regex")
});

static HIGH_URGENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(asap|as soon as possible|urgent|urgently|immediate|immediately|right away|by eod|by end of day|now|today|tonight|this morning|this afternoon|this evening)\b",
    )
    .expect("valid urgency regex")
});

static MEDIUM_URGENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(by tomorrow|by end of the week|next week|in 1 day|in 2 days)\b")
        .expect("valid urgency regex")
});

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid date regex")
});

static MONTH_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(\d{4}))?\b",
    )
    .expect("valid date regex")
});

static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(today|tonight|tomorrow|next week|in (\d{1,3}) days?)\b")
        .expect("valid date regex")
});

/// Deterministic, dependency-free classifier used when no remote model is configured.
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify synchronously. Never fails.
    pub fn verdict(&self, request: &ClassifyRequest) -> Verdict {
        let text = format!("{} {}", request.subject, strip_html(&request.body));

        let is_task = TASK_RE.is_match(&text) || REQUEST_RE.is_match(&text);
        if !is_task {
            return Verdict {
                is_task: false,
                urgency: UrgencyTier::NotUrgent,
                deadline: None,
            };
        }

        let deadline = extract_deadline(&text, request.reference_time);
        let mut urgency = phrase_tier(&text);
        if let Some(deadline) = deadline {
            let days = (deadline - request.reference_time).num_days();
            urgency = urgency.max(UrgencyTier::from_days_until(days));
        }

        debug!(subject = %request.subject, %urgency, ?deadline, "Keyword verdict");
        Verdict {
            is_task,
            urgency,
            deadline,
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<Verdict, ClassifyError> {
        Ok(self.verdict(request))
    }
}

fn phrase_tier(text: &str) -> UrgencyTier {
    if HIGH_URGENCY_RE.is_match(text) {
        UrgencyTier::Urgent
    } else if MEDIUM_URGENCY_RE.is_match(text) {
        UrgencyTier::SomewhatUrgent
    } else {
        UrgencyTier::NotUrgent
    }
}

/// Earliest recognisable date in `text`, resolved against `reference`.
fn extract_deadline(text: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut candidates = Vec::new();

    for caps in ISO_DATE_RE.captures_iter(text) {
        let parts = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        );
        if let (Ok(year), Ok(month), Ok(day)) = parts
            && let Some(date) = NaiveDate::from_ymd_opt(year, month, day)
        {
            candidates.push(midnight(date));
        }
    }

    for caps in MONTH_DATE_RE.captures_iter(text) {
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        let Ok(day) = caps[2].parse::<u32>() else {
            continue;
        };
        let explicit_year = caps.get(3).and_then(|y| y.as_str().parse::<i32>().ok());
        let year = explicit_year.unwrap_or(reference.year());
        let Some(mut date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        // A yearless date already behind us means next year's.
        if explicit_year.is_none()
            && date < reference.date_naive()
            && let Some(next) = NaiveDate::from_ymd_opt(year + 1, month, day)
        {
            date = next;
        }
        candidates.push(midnight(date));
    }

    for caps in RELATIVE_DATE_RE.captures_iter(text) {
        let phrase = caps[1].to_lowercase();
        let offset_days = match phrase.as_str() {
            "today" | "tonight" => Some(0),
            "tomorrow" => Some(1),
            "next week" => Some(7),
            _ => caps.get(2).and_then(|n| n.as_str().parse::<i64>().ok()),
        };
        if let Some(days) = offset_days {
            candidates.push(reference + Duration::days(days));
        }
    }

    candidates.into_iter().min()
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                result.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
