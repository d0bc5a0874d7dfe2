//! Environment-driven configuration for the generation subsystem.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use strata_jobs::StepBudget;

use crate::prototype::{DEFAULT_LEVEL, LevelProtoId};

pub const ENV_QUEUE_BUDGET_MS: &str = "STRATA_QUEUE_BUDGET_MS";
pub const ENV_STEP_BUDGET_MS: &str = "STRATA_STEP_BUDGET_MS";
pub const ENV_STEP_UNIT_CAP: &str = "STRATA_STEP_UNIT_CAP";
pub const ENV_DEFAULT_LEVEL: &str = "STRATA_DEFAULT_LEVEL";
pub const ENV_DEDUPE_REQUESTS: &str = "STRATA_DEDUPE_REQUESTS";
pub const ENV_FRAME_FRACTION: &str = "STRATA_FRAME_FRACTION";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    /// Time the queue may spend per tick.
    pub queue_budget: Duration,
    /// When set, the per-tick budget is this fraction of the host's frame
    /// time instead of `queue_budget`.
    pub frame_fraction: Option<f64>,
    /// Budget each generation job gets per step.
    pub step_budget: StepBudget,
    /// Level requested by the built-in triggers.
    pub default_level: LevelProtoId,
    /// Skip requests for a station/level pair that already has a job in
    /// flight.
    pub dedupe_requests: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            queue_budget: Duration::from_millis(2),
            frame_fraction: None,
            step_budget: StepBudget::default(),
            default_level: LevelProtoId::new(DEFAULT_LEVEL),
            dedupe_requests: true,
        }
    }
}

impl GenerationConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_QUEUE_BUDGET_MS) {
            config.queue_budget = parse_millis(ENV_QUEUE_BUDGET_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FRAME_FRACTION) {
            let fraction: f64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_FRAME_FRACTION, &raw, "not a number"))?;
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ConfigError::invalid(
                    ENV_FRAME_FRACTION,
                    &raw,
                    "must be in (0, 1]",
                ));
            }
            config.frame_fraction = Some(fraction);
        }
        if let Some(raw) = lookup(ENV_STEP_BUDGET_MS) {
            config.step_budget.time = parse_millis(ENV_STEP_BUDGET_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STEP_UNIT_CAP) {
            let cap: u32 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_STEP_UNIT_CAP, &raw, "not an unsigned integer"))?;
            if cap == 0 {
                return Err(ConfigError::invalid(ENV_STEP_UNIT_CAP, &raw, "must be at least 1"));
            }
            config.step_budget = config.step_budget.with_unit_cap(cap);
        }
        if let Some(raw) = lookup(ENV_DEFAULT_LEVEL) {
            let level = raw.trim();
            if level.is_empty() {
                return Err(ConfigError::invalid(ENV_DEFAULT_LEVEL, &raw, "must not be empty"));
            }
            config.default_level = LevelProtoId::new(level);
        }
        if let Some(raw) = lookup(ENV_DEDUPE_REQUESTS) {
            config.dedupe_requests = parse_bool(ENV_DEDUPE_REQUESTS, &raw)?;
        }

        Ok(config)
    }

    /// Queue budget for a tick whose frame took `frame_time`.
    pub fn tick_budget(&self, frame_time: Duration) -> Duration {
        match self.frame_fraction {
            Some(fraction) => frame_time.mul_f64(fraction),
            None => self.queue_budget,
        }
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::invalid(key, raw, "expected whole milliseconds"))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
    }
}
