//! Recognized Config keys and their defaults.

use std::collections::BTreeMap;

use serde::Serialize;

/// A typed Config value. Unknown keys round-trip as opaque strings (see
/// `DESIGN.md` Open Question: unknown keys are accepted).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            ConfigValue::Int(v) => v.to_string(),
            ConfigValue::Float(v) => v.to_string(),
            ConfigValue::Str(v) => v.clone(),
        }
    }
}

pub const KEY_MAX_RETRIES: &str = "max_retries";
pub const KEY_BACKOFF_BASE: &str = "backoff_base";
pub const KEY_POLL_INTERVAL: &str = "poll_interval";
pub const KEY_JOB_TIMEOUT: &str = "job_timeout";

/// The five recognized keys and their default values.
pub fn defaults() -> BTreeMap<&'static str, ConfigValue> {
    let mut map = BTreeMap::new();
    map.insert(KEY_MAX_RETRIES, ConfigValue::Int(3));
    map.insert(KEY_BACKOFF_BASE, ConfigValue::Int(2));
    map.insert(KEY_POLL_INTERVAL, ConfigValue::Float(0.5));
    map.insert(KEY_JOB_TIMEOUT, ConfigValue::Int(120));
    map
}

/// The subset of Config values the Scheduler/Worker Runtime read every poll
/// cycle, resolved with defaults already applied.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub max_retries: i64,
    pub backoff_base: i64,
    pub poll_interval_secs: f64,
    pub job_timeout_secs: i64,
}

impl EngineConfig {
    pub fn from_map(map: &BTreeMap<String, ConfigValue>) -> Self {
        Self {
            max_retries: map
                .get(KEY_MAX_RETRIES)
                .and_then(ConfigValue::as_int)
                .unwrap_or(3),
            backoff_base: map
                .get(KEY_BACKOFF_BASE)
                .and_then(ConfigValue::as_int)
                .unwrap_or(2),
            poll_interval_secs: map
                .get(KEY_POLL_INTERVAL)
                .and_then(ConfigValue::as_float)
                .unwrap_or(0.5),
            job_timeout_secs: map
                .get(KEY_JOB_TIMEOUT)
                .and_then(ConfigValue::as_int)
                .unwrap_or(120),
        }
    }

    /// `max(3 * poll_interval, 30s)`, the staleness threshold used by
    /// Stuck-Job Recovery.
    pub fn stale_heartbeat_secs(&self) -> f64 {
        (3.0 * self.poll_interval_secs).max(30.0)
    }
}

/// Validate a raw CLI-supplied value against the recognized key's type and
/// non-negativity constraint. Unknown keys are accepted as opaque strings.
pub fn validate(key: &str, raw: &str) -> Result<ConfigValue, crate::error::QueueCtlError> {
    let reject = |msg: String| crate::error::QueueCtlError::Config(msg);

    match key {
        KEY_MAX_RETRIES | KEY_JOB_TIMEOUT => {
            let v: i64 = raw
                .parse()
                .map_err(|_| reject(format!("{key} must be an integer")))?;
            if v < 0 {
                return Err(reject(format!("{key} must not be negative")));
            }
            Ok(ConfigValue::Int(v))
        }
        KEY_BACKOFF_BASE => {
            let v: i64 = raw
                .parse()
                .map_err(|_| reject(format!("{key} must be an integer")))?;
            if v < 0 {
                return Err(reject(format!("{key} must not be negative")));
            }
            Ok(ConfigValue::Int(v))
        }
        KEY_POLL_INTERVAL => {
            let v: f64 = raw
                .parse()
                .map_err(|_| reject(format!("{key} must be a number")))?;
            if v < 0.0 {
                return Err(reject(format!("{key} must not be negative")));
            }
            Ok(ConfigValue::Float(v))
        }
        _ => Ok(ConfigValue::Str(raw.to_string())),
    }
}
