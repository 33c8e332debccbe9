//! Mailbox names: the tenant key partitioning the record store.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid mailbox regex")
});

/// Check whether a string is shaped like an email address.
pub fn is_valid_address(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}

/// A validated mailbox name (one recipient's partition).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mailbox(String);

impl Mailbox {
    /// Validate and wrap a partition name. Returns `None` for anything that
    /// is not an email-address-shaped string.
    pub fn parse(name: &str) -> Option<Self> {
        is_valid_address(name).then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Mailbox {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_address(&value) {
            Ok(Self(value))
        } else {
            Err(format!("not a valid mailbox address: {value}"))
        }
    }
}

impl From<Mailbox> for String {
    fn from(mailbox: Mailbox) -> Self {
        mailbox.0
    }
}

/// Split raw partition names into valid mailboxes, logging the rest.
pub fn valid_mailboxes(names: Vec<String>) -> Vec<Mailbox> {
    names
        .into_iter()
        .filter_map(|name| {
            let parsed = Mailbox::parse(&name);
            if parsed.is_none() {
                tracing::warn!(partition = %name, "Skipping invalid mailbox name (not an email)");
            }
            parsed
        })
        .collect()
}
