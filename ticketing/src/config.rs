//! Configuration management for the box office.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file in the working directory is honored by the binary.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Longest span any time-based policy setting may cover (ten years)
const MAX_POLICY_DAYS: i64 = 3_650;
const MAX_POLICY_HOURS: i64 = MAX_POLICY_DAYS * 24;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the collection files
    pub data_dir: PathBuf,
    /// Initial simulated time (defaults to the wall clock at startup)
    pub start_time: Option<DateTime<Utc>>,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Business rules
    pub policy: PolicyConfig,
}

/// What happens when a customer checks in before the event starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyCheckIn {
    /// Early arrivals are marked present
    #[default]
    Accept,
    /// Early arrivals are treated as absent
    Reject,
}

impl FromStr for EarlyCheckIn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown early check-in policy: {other}")),
        }
    }
}

/// Tunable business rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Hours an unpaid registration holds its seats
    pub grace_hours: i64,
    /// Refunds close this many hours before the event starts
    pub refund_cutoff_hours: i64,
    /// Percentage kept as a processing fee on customer refunds
    pub refund_fee_percent: u8,
    /// Minimum length of a refund reason, in characters
    pub min_refund_reason: usize,
    /// Events must be created, and may only be cancelled, this many days ahead
    pub min_lead_days: i64,
    /// Early check-in handling
    pub early_check_in: EarlyCheckIn,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            grace_hours: 24,
            refund_cutoff_hours: 2,
            refund_fee_percent: 20,
            min_refund_reason: 10,
            min_lead_days: 7,
            early_check_in: EarlyCheckIn::Accept,
        }
    }
}

impl PolicyConfig {
    /// How long an unpaid registration holds its seats
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::hours(self.grace_hours.clamp(0, MAX_POLICY_HOURS))
    }

    /// How long before the start refunds close
    #[must_use]
    pub fn refund_cutoff(&self) -> Duration {
        Duration::hours(self.refund_cutoff_hours.clamp(0, MAX_POLICY_HOURS))
    }

    /// Minimum notice for creating or cancelling an event
    #[must_use]
    pub fn min_lead(&self) -> Duration {
        Duration::days(self.min_lead_days.clamp(0, MAX_POLICY_DAYS))
    }

    /// Percentage of the payment a customer gets back
    #[must_use]
    pub fn refund_percent(&self) -> u8 {
        100u8.saturating_sub(self.refund_fee_percent.min(100))
    }

    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the policy from `lookup`, keeping the default for any value
    /// that is missing, unparsable or out of range.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let hours = 0..=MAX_POLICY_HOURS;
        Self {
            grace_hours: bounded(&lookup, "BOXOFFICE_GRACE_HOURS", &hours)
                .unwrap_or(defaults.grace_hours),
            refund_cutoff_hours: bounded(&lookup, "BOXOFFICE_REFUND_CUTOFF_HOURS", &hours)
                .unwrap_or(defaults.refund_cutoff_hours),
            refund_fee_percent: bounded(&lookup, "BOXOFFICE_REFUND_FEE_PERCENT", &(0..=100))
                .unwrap_or(defaults.refund_fee_percent),
            min_refund_reason: parsed(&lookup, "BOXOFFICE_MIN_REFUND_REASON")
                .unwrap_or(defaults.min_refund_reason),
            min_lead_days: bounded(&lookup, "BOXOFFICE_MIN_LEAD_DAYS", &(0..=MAX_POLICY_DAYS))
                .unwrap_or(defaults.min_lead_days),
            early_check_in: parsed(&lookup, "BOXOFFICE_EARLY_CHECK_IN")
                .unwrap_or(defaults.early_check_in),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var("BOXOFFICE_DATA_DIR")
                .map_or_else(|_| PathBuf::from("data"), PathBuf::from),
            start_time: env::var("BOXOFFICE_START_TIME")
                .ok()
                .and_then(|s| crate::time::parse_instant(&s).ok()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            policy: PolicyConfig::from_env(),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let value = raw.trim().parse().ok();
    if value.is_none() {
        tracing::warn!(key, value = %raw, "Ignoring unparsable setting");
    }
    value
}

fn bounded<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    range: &RangeInclusive<T>,
) -> Option<T>
where
    T: FromStr + PartialOrd + std::fmt::Display,
{
    let value = parsed(lookup, key)?;
    if range.contains(&value) {
        Some(value)
    } else {
        tracing::warn!(
            key,
            %value,
            min = %range.start(),
            max = %range.end(),
            "Ignoring out-of-range setting"
        );
        None
    }
}
