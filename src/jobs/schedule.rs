//! Tickers: when the daily jobs fire.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::ConfigError;

/// A source of trigger instants. `tick` resolves at the next fire time.
///
/// Dropping an in-flight `tick` future must not lose or duplicate a fire.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// Fires on a cron schedule evaluated in UTC (seconds field first).
pub struct CronTicker {
    schedule: cron::Schedule,
    last_fire: Option<DateTime<Utc>>,
    /// Instant the in-flight `tick` is waiting for. Survives a dropped future.
    pending: Option<DateTime<Utc>>,
}

impl CronTicker {
    pub fn new(expression: &str) -> Result<Self, ConfigError> {
        let schedule = cron::Schedule::from_str(expression).map_err(|e| ConfigError::InvalidValue {
            key: "cron".into(),
            message: format!("invalid cron '{expression}': {e}"),
        })?;
        Ok(Self {
            schedule,
            last_fire: None,
            pending: None,
        })
    }

    /// Next fire time strictly after both `now` and the previous fire.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let from = match self.last_fire {
            Some(last) if last > now => last,
            _ => now,
        };
        self.schedule.after(&from).next()
    }
}

#[async_trait]
impl Ticker for CronTicker {
    async fn tick(&mut self) {
        let next = match self.pending {
            Some(next) => next,
            None => {
                let Some(next) = self.next_fire(Utc::now()) else {
                    // Schedule exhausted (e.g. a fixed past year).
                    std::future::pending::<()>().await;
                    return;
                };
                self.pending = Some(next);
                next
            }
        };
        // Already past if the previous future was dropped late: fire now.
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;
        self.last_fire = Some(next);
        self.pending = None;
    }
}

/// Fires every `period`, starting one period from creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
