//! Persisted JSON form of brokers.
//!
//! ```text
//! {
//!   "id": "0", "active": true, "host": "like:node\\d", "cpus": 0.5, "mem": 128, "heap": 64,
//!   "constraints": "rack=unique,zone=cluster",
//!   "options": "log.dirs=/data/$id",
//!   "failover": { "delay": "10s", "maxDelay": "1m", "maxTries": 5,
//!                 "failures": 2, "failureTime": "2026-03-01T12:00:00Z" },
//!   "task": { "id": "broker-0-…", "running": true, "host": "node1", "port": 31000,
//!             "attributes": "rack=r1" }
//! }
//! ```
//!
//! Maps are flattened into `k=v,k=v` strings; `\` escapes `,`, `=` and `\`.
//! Optional fields are omitted when absent. Missing required fields are
//! rejected rather than defaulted.

use std::time::Duration;

use brokerd_core::period::serde_period;
use brokerd_placement::{Constraint, PlacementRequirements};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::broker::Broker;
use crate::error::{SchedulerError, SchedulerResult};
use crate::failover::Failover;
use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerRecord {
    pub id: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub cpus: f64,
    pub mem: u64,
    pub heap: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    pub failover: FailoverRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverRecord {
    #[serde(with = "serde_period")]
    pub delay: Duration,
    #[serde(with = "serde_period")]
    pub max_delay: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tries: Option<u32>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub running: bool,
    pub host: String,
    pub port: u16,
    pub attributes: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

// ── Broker ⇄ record ────────────────────────────────────────────────

impl From<&Broker> for BrokerRecord {
    fn from(broker: &Broker) -> Self {
        let requirements = &broker.requirements;
        let constraints = (!requirements.constraints.is_empty()).then(|| {
            format_map(
                requirements
                    .constraints
                    .iter()
                    .map(|(k, c)| (k.as_str(), c.to_string())),
            )
        });
        let options = (!broker.options.is_empty()).then(|| {
            format_map(broker.options.iter().map(|(k, v)| (k.as_str(), v.clone())))
        });

        Self {
            id: broker.id.clone(),
            active: broker.is_active(),
            host: requirements.host.as_ref().map(Constraint::to_string),
            cpus: requirements.cpus,
            mem: requirements.mem,
            heap: broker.heap,
            constraints,
            options,
            failover: FailoverRecord::from(&broker.failover()),
            task: broker.task().map(|t| TaskRecord::from(t.as_ref())),
        }
    }
}

impl TryFrom<BrokerRecord> for Broker {
    type Error = SchedulerError;

    fn try_from(record: BrokerRecord) -> SchedulerResult<Self> {
        let mut requirements = PlacementRequirements::new(record.cpus, record.mem);
        requirements.host = record
            .host
            .as_deref()
            .map(str::parse::<Constraint>)
            .transpose()
            .map_err(|e| SchedulerError::invalid_field("host", e))?;

        if let Some(constraints) = record.constraints.as_deref() {
            for (name, text) in parse_map(constraints, "constraints")? {
                let constraint = text
                    .parse::<Constraint>()
                    .map_err(|e| SchedulerError::invalid_field(format!("constraints.{name}"), e))?;
                requirements.constraints.insert(name, constraint);
            }
        }

        let failover = Failover::try_from(record.failover)?;
        let mut broker = Broker::with_parts(record.id, requirements, record.heap, failover);
        if let Some(options) = record.options.as_deref() {
            broker.options = parse_map(options, "options")?;
        }
        broker.set_active(record.active);
        broker.restore_task(record.task.map(Task::try_from).transpose()?);
        Ok(broker)
    }
}

impl From<&Failover> for FailoverRecord {
    fn from(failover: &Failover) -> Self {
        Self {
            delay: failover.delay,
            max_delay: failover.max_delay,
            max_tries: failover.max_tries,
            failures: failover.failures(),
            failure_time: failover.failure_time(),
        }
    }
}

impl TryFrom<FailoverRecord> for Failover {
    type Error = SchedulerError;

    fn try_from(record: FailoverRecord) -> SchedulerResult<Self> {
        let mut failover = Failover::new(record.delay, record.max_delay);
        failover.max_tries = record.max_tries;
        failover
            .restore(record.failures, record.failure_time)
            .ok_or_else(|| {
                SchedulerError::invalid_field(
                    "failover",
                    "failureTime must be present exactly when failures > 0",
                )
            })
    }
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            running: task.is_running(),
            host: task.host.clone(),
            port: task.port,
            attributes: format_map(task.attributes.iter().map(|(k, v)| (k.as_str(), v.clone()))),
        }
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = SchedulerError;

    fn try_from(record: TaskRecord) -> SchedulerResult<Self> {
        let attributes = parse_map(&record.attributes, "task.attributes")?
            .into_iter()
            .collect();
        let task = Task::new(record.id, record.host, record.port, attributes);
        task.set_running(record.running);
        Ok(task)
    }
}

impl Broker {
    pub fn to_json(&self) -> SchedulerResult<serde_json::Value> {
        Ok(serde_json::to_value(BrokerRecord::from(self))?)
    }

    pub fn from_json(value: serde_json::Value) -> SchedulerResult<Self> {
        let record: BrokerRecord = serde_json::from_value(value)?;
        Broker::try_from(record)
    }

    pub fn to_json_string(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(&BrokerRecord::from(self))?)
    }

    pub fn from_json_str(s: &str) -> SchedulerResult<Self> {
        let record: BrokerRecord = serde_json::from_str(s)?;
        Broker::try_from(record)
    }
}

// ── Flattened maps ─────────────────────────────────────────────────

/// Render `k=v,k=v`, escaping separators with `\`.
pub fn format_map<'a, V: AsRef<str>>(entries: impl IntoIterator<Item = (&'a str, V)>) -> String {
    entries
        .into_iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v.as_ref())))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a `k=v,k=v` string. `field` names the source in errors.
pub fn parse_map(s: &str, field: &str) -> SchedulerResult<IndexMap<String, String>> {
    let mut map = IndexMap::new();
    if s.is_empty() {
        return Ok(map);
    }

    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut chars = s.chars();

    let mut finish = |key: &mut String, value: &mut String, in_value: bool| {
        if !in_value || key.is_empty() {
            return Err(SchedulerError::invalid_field(
                field,
                format!("malformed entry {key:?} in {s:?}"),
            ));
        }
        map.insert(std::mem::take(key), std::mem::take(value));
        Ok(())
    };

    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => chars.next().ok_or_else(|| {
                SchedulerError::invalid_field(field, format!("dangling escape in {s:?}"))
            })?,
            ',' => {
                finish(&mut key, &mut value, in_value)?;
                in_value = false;
                continue;
            }
            '=' if !in_value => {
                in_value = true;
                continue;
            }
            c => c,
        };
        if in_value {
            value.push(c);
        } else {
            key.push(c);
        }
    }
    finish(&mut key, &mut value, in_value)?;

    Ok(map)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | '=' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
