use serde::{Deserialize, Serialize};

use crate::offset::Scn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
/// The configuration of a log mining source
pub struct LogminerConfig {
    /// where to start when no offset is given; Default: Snapshot
    #[serde(default)]
    pub start: StartPosition,

    /// SCN window sizing
    #[serde(default)]
    pub window: WindowConfig,

    /// retry policy for session start, window advance and fetch
    #[serde(default)]
    pub retry: RetryConfig,

    /// maximum number of records returned by one poll; Default: 1000
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: usize,

    /// decode errors in one window above which a warning is raised; Default: 100
    #[serde(default = "default_decode_error_threshold")]
    pub decode_error_threshold: usize,

    /// let Oracle discover redo logs itself (11g and earlier); Default: false
    #[serde(default)]
    pub continuous_mine: bool,

    /// only mine changes from this pluggable database container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub con_id: Option<u32>,
}

impl Default for LogminerConfig {
    fn default() -> Self {
        Self {
            start: StartPosition::default(),
            window: WindowConfig::default(),
            retry: RetryConfig::default(),
            poll_batch_size: default_poll_batch_size(),
            decode_error_threshold: default_decode_error_threshold(),
            continuous_mine: false,
            con_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StartPosition {
    /// In yaml, present as `Now`
    Now,
    /// In yaml, present as tag: `!Scn`
    Scn(Scn),
    /// In yaml, present as `Snapshot`
    #[default]
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    /// SCNs covered by the first window; Default: 10000
    #[serde(default = "default_window_size")]
    pub default_size: u64,

    /// Default: 100
    #[serde(default = "default_min_window_size")]
    pub min_size: u64,

    /// Default: 1000000
    #[serde(default = "default_max_window_size")]
    pub max_size: u64,

    /// rows in a window above which the next window shrinks; Default: 10000
    #[serde(default = "default_high_water_rows")]
    pub high_water_rows: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_size: default_window_size(),
            min_size: default_min_window_size(),
            max_size: default_max_window_size(),
            high_water_rows: default_high_water_rows(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// attempts including the first one; Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Default: 200
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Default: 10000
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

pub fn default_poll_batch_size() -> usize {
    1000
}

pub fn default_decode_error_threshold() -> usize {
    100
}

pub fn default_window_size() -> u64 {
    10_000
}

pub fn default_min_window_size() -> u64 {
    100
}

pub fn default_max_window_size() -> u64 {
    1_000_000
}

pub fn default_high_water_rows() -> usize {
    10_000
}

pub fn default_max_attempts() -> u32 {
    5
}

pub fn default_initial_backoff_ms() -> u64 {
    200
}

pub fn default_max_backoff_ms() -> u64 {
    10_000
}
