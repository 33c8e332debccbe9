//! Configuration types, built from `TRIAGE_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::mailbox::is_valid_address;

/// Tunables for the two primary workers.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum unprocessed records pulled per mailbox per scan.
    pub batch_size: usize,
    /// Pause between batch scans.
    pub scan_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            scan_interval: Duration::from_secs(5),
        }
    }
}

/// SMTP relay used by the digest notifier.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Sender address, also the SMTP login.
    pub address: String,
    pub passkey: SecretString,
}

/// Cron expressions (seconds field first, UTC) for the daily jobs.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub reconcile_cron: String,
    pub digest_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reconcile_cron: "0 0 0 * * *".to_string(),
            digest_cron: "0 0 9 * * *".to_string(),
        }
    }
}

/// Which classifier to run.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Remote endpoint. `None` selects the built-in keyword classifier.
    pub url: Option<String>,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub db_path: PathBuf,
    pub smtp: SmtpConfig,
    pub pipeline: PipelineSettings,
    pub schedule: ScheduleConfig,
    pub classifier: ClassifierConfig,
    /// Directory for rolling log files. Console-only when unset.
    pub log_dir: Option<PathBuf>,
}

impl TriageConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = PathBuf::from(required(&lookup, "TRIAGE_DB_PATH")?);

        let address = required(&lookup, "TRIAGE_EMAIL_ADDRESS")?;
        if !is_valid_address(&address) {
            return Err(ConfigError::InvalidValue {
                key: "TRIAGE_EMAIL_ADDRESS".into(),
                message: format!("'{address}' is not an email address"),
            });
        }
        let passkey = SecretString::from(required(&lookup, "TRIAGE_EMAIL_PASSKEY")?);

        let smtp = SmtpConfig {
            host: optional(&lookup, "TRIAGE_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".into()),
            port: parse_or(&lookup, "TRIAGE_SMTP_PORT", 587)?,
            address,
            passkey,
        };

        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            batch_size: positive(&lookup, "TRIAGE_BATCH_SIZE", defaults.batch_size)?,
            scan_interval: Duration::from_secs(positive(
                &lookup,
                "TRIAGE_SCAN_INTERVAL_SECS",
                defaults.scan_interval.as_secs(),
            )?),
        };

        let default_schedule = ScheduleConfig::default();
        let schedule = ScheduleConfig {
            reconcile_cron: cron_or(&lookup, "TRIAGE_RECONCILE_CRON", default_schedule.reconcile_cron)?,
            digest_cron: cron_or(&lookup, "TRIAGE_DIGEST_CRON", default_schedule.digest_cron)?,
        };

        let classifier = ClassifierConfig {
            url: optional(&lookup, "TRIAGE_CLASSIFIER_URL"),
            timeout: Duration::from_secs(positive(
                &lookup,
                "TRIAGE_CLASSIFIER_TIMEOUT_SECS",
                ClassifierConfig::default().timeout.as_secs(),
            )?),
        };

        Ok(Self {
            db_path,
            smtp,
            pipeline,
            schedule,
            classifier,
            log_dir: optional(&lookup, "TRIAGE_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Non-empty, trimmed value or `None`.
fn optional<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_or(lookup, key, default)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

fn cron_or<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: String,
) -> Result<String, ConfigError> {
    let expr = optional(lookup, key).unwrap_or(default);
    cron::Schedule::from_str(&expr).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{expr}': {e}"),
    })?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("TRIAGE_DB_PATH", "/tmp/triage.db"),
            ("TRIAGE_EMAIL_ADDRESS", "digest@example.com"),
            ("TRIAGE_EMAIL_PASSKEY", "hunter2"),
        ]
    }

    #[test]
    fn defaults_applied() {
        let config = TriageConfig::from_lookup(lookup_from(&required_vars())).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/triage.db"));
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.passkey.expose_secret(), "hunter2");
        assert_eq!(config.pipeline.batch_size, 20);
        assert_eq!(config.pipeline.scan_interval, Duration::from_secs(5));
        assert_eq!(config.schedule.reconcile_cron, "0 0 0 * * *");
        assert_eq!(config.schedule.digest_cron, "0 0 9 * * *");
        assert!(config.classifier.url.is_none());
        assert_eq!(config.classifier.timeout, Duration::from_secs(30));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn overrides_applied() {
        let mut vars = required_vars();
        vars.extend([
            ("TRIAGE_SMTP_HOST", "smtp.example.com"),
            ("TRIAGE_SMTP_PORT", "2525"),
            ("TRIAGE_BATCH_SIZE", "50"),
            ("TRIAGE_SCAN_INTERVAL_SECS", "30"),
            ("TRIAGE_DIGEST_CRON", "0 30 7 * * Mon-Fri"),
            ("TRIAGE_CLASSIFIER_URL", "http://localhost:8080/classify"),
            ("TRIAGE_LOG_DIR", "/var/log/triage"),
        ]);
        let config = TriageConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.pipeline.batch_size, 50);
        assert_eq!(config.pipeline.scan_interval, Duration::from_secs(30));
        assert_eq!(config.schedule.digest_cron, "0 30 7 * * Mon-Fri");
        assert_eq!(
            config.classifier.url.as_deref(),
            Some("http://localhost:8080/classify")
        );
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/triage")));
    }

    #[test]
    fn missing_store_target_is_fatal() {
        let vars: Vec<_> = required_vars()
            .into_iter()
            .filter(|(k, _)| *k != "TRIAGE_DB_PATH")
            .collect();
        let err = TriageConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TRIAGE_DB_PATH"));
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let mut vars = required_vars();
        vars.retain(|(k, _)| *k != "TRIAGE_EMAIL_PASSKEY");
        vars.push(("TRIAGE_EMAIL_PASSKEY", "   "));
        let err = TriageConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TRIAGE_EMAIL_PASSKEY"));
    }

    #[test]
    fn invalid_sender_address_rejected() {
        let mut vars = required_vars();
        vars.retain(|(k, _)| *k != "TRIAGE_EMAIL_ADDRESS");
        vars.push(("TRIAGE_EMAIL_ADDRESS", "not-an-address"));
        let err = TriageConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let mut vars = required_vars();
        vars.push(("TRIAGE_BATCH_SIZE", "0"));
        let err = TriageConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TRIAGE_BATCH_SIZE"));
    }

    #[test]
    fn unparseable_port_rejected() {
        let mut vars = required_vars();
        vars.push(("TRIAGE_SMTP_PORT", "smtp"));
        let err = TriageConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TRIAGE_SMTP_PORT"));
    }

    #[test]
    fn bad_cron_rejected() {
        let mut vars = required_vars();
        vars.push(("TRIAGE_RECONCILE_CRON", "every midnight"));
        let err = TriageConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TRIAGE_RECONCILE_CRON"));
    }
}
