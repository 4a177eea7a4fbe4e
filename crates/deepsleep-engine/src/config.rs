use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::state::{Policy, DEFAULT_IDLE_TIMEOUT_US, DEFAULT_MAX_HARQ_FAILURES};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(String),
    #[error("unsupported config version {0}")]
    Version(u32),
    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfigInput {
    pub version: u32,
    pub policy: PolicyConfigInput,
    pub report: ReportConfigInput,
    pub dispatch: DispatchConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfigInput {
    pub idle_timeout_us: Option<u64>,
    pub max_harq_failures: Option<u32>,
    pub tti_us: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfigInput {
    pub interval_s: Option<u64>,
    pub energy_reduction_percent: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatchConfigInput {
    pub queue_capacity: Option<usize>,
    pub inline: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub interval: Duration,
    /// Power reduction while in deep sleep, used for savings estimates.
    pub energy_reduction_percent: u8,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            energy_reduction_percent: 37,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    /// Send controls on the ingesting thread instead of the worker.
    pub inline: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            inline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub version: u32,
    pub policy: Policy,
    /// TTI length the subscription reports at.
    pub tti_us: u32,
    pub report: ReportConfig,
    pub dispatch: DispatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            policy: Policy::default(),
            tti_us: 1000,
            report: ReportConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl EngineConfigInput {
    pub fn resolve(self) -> Result<EngineConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::Version(version));
        }

        let defaults = EngineConfig::default();

        let policy = Policy::new(
            self.policy.idle_timeout_us.unwrap_or(DEFAULT_IDLE_TIMEOUT_US),
            self.policy
                .max_harq_failures
                .unwrap_or(DEFAULT_MAX_HARQ_FAILURES),
        )?;

        let tti_us = self.policy.tti_us.unwrap_or(defaults.tti_us);
        if tti_us == 0 {
            return Err(ConfigError::Invalid {
                field: "policy.tti_us",
                reason: "must be greater than zero",
            });
        }

        let interval_s = self
            .report
            .interval_s
            .unwrap_or(defaults.report.interval.as_secs());
        if interval_s == 0 {
            return Err(ConfigError::Invalid {
                field: "report.interval_s",
                reason: "must be greater than zero",
            });
        }
        let energy_reduction_percent = self
            .report
            .energy_reduction_percent
            .unwrap_or(defaults.report.energy_reduction_percent);
        if energy_reduction_percent > 100 {
            return Err(ConfigError::Invalid {
                field: "report.energy_reduction_percent",
                reason: "must be at most 100",
            });
        }

        let queue_capacity = self
            .dispatch
            .queue_capacity
            .unwrap_or(defaults.dispatch.queue_capacity);
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch.queue_capacity",
                reason: "must be at least 1",
            });
        }

        Ok(EngineConfig {
            version,
            policy,
            tti_us,
            report: ReportConfig {
                interval: Duration::from_secs(interval_s),
                energy_reduction_percent,
            },
            dispatch: DispatchConfig {
                queue_capacity,
                inline: self.dispatch.inline.unwrap_or(defaults.dispatch.inline),
            },
        })
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(EngineConfig::default());
        }
        let parsed: EngineConfigInput =
            toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;
        parsed.resolve()
    }
}
