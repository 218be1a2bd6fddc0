//! brokerd-core — shared building blocks for the brokerd scheduler core.
//!
//! - **`config`** — `brokerd.toml` parsing (broker defaults, failover policy, wait tuning)
//! - **`period`** — compact duration strings (`"10s"`, `"1m"`, `"500ms"`)
//! - **`ids`** — task/executor identifier generation and parsing

pub mod config;
pub mod error;
pub mod ids;
pub mod period;

pub use config::{BrokerDefaults, FailoverDefaults, SchedulerConfig, WaitConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{id_from_task_id, next_executor_id, next_task_id};
pub use period::{format_period, parse_period};
