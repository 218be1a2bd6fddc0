//! brokerd.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::period::serde_period;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub broker: BrokerDefaults,
    pub failover: FailoverDefaults,
    pub wait: WaitConfig,
}

/// Resource demands given to brokers that don't set their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerDefaults {
    pub cpus: f64,
    /// Memory in MiB.
    pub mem: u64,
    /// JVM-style heap for the worker process, in MiB.
    pub heap: u64,
}

impl Default for BrokerDefaults {
    fn default() -> Self {
        Self {
            cpus: 1.0,
            mem: 2048,
            heap: 1024,
        }
    }
}

/// Retry policy given to new brokers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverDefaults {
    #[serde(with = "serde_period")]
    pub delay: Duration,
    #[serde(with = "serde_period")]
    pub max_delay: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,
}

impl Default for FailoverDefaults {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(600),
            max_tries: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    #[serde(with = "serde_period")]
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl SchedulerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the scheduler cannot act on.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.broker.cpus.is_finite() && self.broker.cpus >= 0.0,
            "broker.cpus must be a non-negative number, got {}",
            self.broker.cpus
        );
        anyhow::ensure!(
            self.failover.max_delay >= self.failover.delay,
            "failover.max_delay must not be shorter than failover.delay"
        );
        anyhow::ensure!(
            !self.wait.poll_interval.is_zero(),
            "wait.poll_interval must be positive"
        );
        Ok(())
    }
}
