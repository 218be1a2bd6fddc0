//! Cluster — the set of brokers the scheduler manages.
//!
//! The cluster is what the offer and status handlers talk to:
//!
//! - `match_offer` picks the first broker (in registration order) that
//!   should start on an offer
//! - `launch` attaches a new task to the chosen broker
//! - `on_task_status` applies a status update and drives failover
//! - `brokers_to_kill` lists inactive brokers that still have a task
//!
//! Brokers are held as `Arc<Broker>`; handlers keep working on a broker even
//! if it is removed concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use brokerd_core::{SchedulerConfig, id_from_task_id, next_task_id};
use brokerd_placement::{AttributeRegistry, HOST_ATTRIBUTE, ResourceOffer};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::error::{SchedulerError, SchedulerResult};
use crate::task::Task;
use crate::wire::BrokerRecord;

/// Largest number of ids a single `a..b` range may expand to.
pub const MAX_RANGE_IDS: u64 = 10_000;

/// Broker ids travel inside `-`-delimited task ids, so they cannot contain `-`.
fn validate_broker_id(id: &str) -> SchedulerResult<()> {
    if id.is_empty() || id.contains('-') {
        return Err(SchedulerError::InvalidBrokerId(id.to_string()));
    }
    Ok(())
}

/// Task state reported by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Staging,
    Starting,
    Running,
    Finished,
    Killed,
    Failed,
    Lost,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Finished
                | TaskStatus::Killed
                | TaskStatus::Failed
                | TaskStatus::Lost
                | TaskStatus::Error
        )
    }

    /// Terminal states that count as a failure.
    pub fn is_abnormal(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Lost | TaskStatus::Error)
    }
}

/// What a status update did to its broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Non-terminal, non-running update; nothing changed.
    Unchanged,
    /// Task reported running; failures were reset.
    Started,
    /// Task ended without counting as a failure.
    Stopped,
    /// Task failed; the broker will be retried after `next_start`.
    Failed {
        failures: u32,
        next_start: DateTime<Utc>,
    },
    /// Task failed and the broker reached its max tries. The broker stays
    /// active; the caller decides whether to stop it.
    RetriesExhausted { failures: u32 },
    /// Unknown broker or a task that is no longer current.
    Ignored,
}

/// Attribute values held by every broker except one.
///
/// Built as a snapshot so matching never holds cluster locks.
#[derive(Debug, Clone, Default)]
pub struct SiblingAttributes {
    values: HashMap<String, Vec<String>>,
}

impl AttributeRegistry for SiblingAttributes {
    fn claimed(&self, name: &str) -> Vec<String> {
        self.values.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct Cluster {
    framework_id: RwLock<Option<String>>,
    brokers: RwLock<Vec<Arc<Broker>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<String>,
    #[serde(default)]
    pub brokers: Vec<BrokerRecord>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn framework_id(&self) -> Option<String> {
        self.framework_id.read().clone()
    }

    pub fn set_framework_id(&self, id: Option<String>) {
        *self.framework_id.write() = id;
    }

    // ── Registry ───────────────────────────────────────────────────

    /// Snapshot of all brokers in registration order.
    pub fn brokers(&self) -> Vec<Arc<Broker>> {
        self.brokers.read().clone()
    }

    pub fn broker(&self, id: &str) -> Option<Arc<Broker>> {
        self.brokers.read().iter().find(|b| b.id == id).cloned()
    }

    pub fn add_broker(&self, broker: Broker) -> SchedulerResult<Arc<Broker>> {
        validate_broker_id(&broker.id)?;
        let mut brokers = self.brokers.write();
        if brokers.iter().any(|b| b.id == broker.id) {
            return Err(SchedulerError::DuplicateBroker(broker.id));
        }
        let broker = Arc::new(broker);
        brokers.push(broker.clone());
        info!(broker = %broker.id, "broker added");
        Ok(broker)
    }

    /// Add one broker per id with the configured defaults.
    pub fn add_brokers(
        &self,
        ids: &[String],
        config: &SchedulerConfig,
    ) -> SchedulerResult<Vec<Arc<Broker>>> {
        for id in ids {
            validate_broker_id(id)?;
        }
        {
            let brokers = self.brokers.read();
            if let Some(id) = ids.iter().find(|id| brokers.iter().any(|b| &b.id == *id)) {
                return Err(SchedulerError::DuplicateBroker(id.clone()));
            }
        }
        ids.iter()
            .map(|id| self.add_broker(Broker::new(id.clone(), config)))
            .collect()
    }

    /// Remove a stopped broker.
    pub fn remove_broker(&self, id: &str) -> SchedulerResult<Arc<Broker>> {
        let mut brokers = self.brokers.write();
        let index = brokers
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| SchedulerError::BrokerNotFound(id.to_string()))?;
        let broker = &brokers[index];
        if broker.is_active() || broker.task().is_some() {
            return Err(SchedulerError::BrokerActive(id.to_string()));
        }
        let removed = brokers.remove(index);
        info!(broker = %id, "broker removed");
        Ok(removed)
    }

    /// Change a stopped broker's settings.
    ///
    /// The edit is applied to a copy which then replaces the registered
    /// broker, so readers holding the old `Arc` never see a partial update.
    pub fn update_broker(
        &self,
        id: &str,
        update: impl FnOnce(&mut Broker),
    ) -> SchedulerResult<Arc<Broker>> {
        let mut brokers = self.brokers.write();
        let slot = brokers
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| SchedulerError::BrokerNotFound(id.to_string()))?;
        if slot.is_active() || slot.task().is_some() {
            return Err(SchedulerError::BrokerActive(id.to_string()));
        }

        let mut updated = (**slot).clone();
        update(&mut updated);
        updated.id = id.to_string();
        *slot = Arc::new(updated);
        debug!(broker = %id, "broker updated");
        Ok(slot.clone())
    }

    /// Expand an id expression into broker ids.
    ///
    /// `*` is every registered broker; otherwise a comma-separated list of
    /// ids and numeric ranges (`0..2` is `0,1,2`). Duplicates are dropped.
    /// A range may cover at most [`MAX_RANGE_IDS`] ids.
    pub fn expand_ids(&self, expr: &str) -> SchedulerResult<Vec<String>> {
        let expr = expr.trim();
        if expr == "*" {
            return Ok(self.brokers.read().iter().map(|b| b.id.clone()).collect());
        }

        let invalid = || SchedulerError::InvalidIdExpression(expr.to_string());
        let mut ids = Vec::new();
        for part in expr.split(',').map(str::trim) {
            if part.is_empty() {
                return Err(invalid());
            }
            match part.split_once("..") {
                Some((start, end)) => {
                    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
                    let end: u64 = end.trim().parse().map_err(|_| invalid())?;
                    if start > end || end - start >= MAX_RANGE_IDS {
                        return Err(invalid());
                    }
                    ids.extend((start..=end).map(|i| i.to_string()));
                }
                None => {
                    validate_broker_id(part)?;
                    ids.push(part.to_string());
                }
            }
        }

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        Ok(ids)
    }

    /// Values other brokers' tasks hold, keyed by attribute name.
    ///
    /// `host` maps to each task's host.
    pub fn sibling_attributes(&self, broker_id: &str) -> SiblingAttributes {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for broker in self.brokers.read().iter().filter(|b| b.id != broker_id) {
            let Some(task) = broker.task() else { continue };
            values
                .entry(HOST_ATTRIBUTE.to_string())
                .or_default()
                .push(task.host.clone());
            for (name, value) in &task.attributes {
                values.entry(name.clone()).or_default().push(value.clone());
            }
        }
        SiblingAttributes { values }
    }

    // ── Offers ─────────────────────────────────────────────────────

    /// First broker that should start on `offer`.
    ///
    /// Brokers that exhausted their retries are skipped but left active.
    pub fn match_offer(&self, offer: &ResourceOffer, now: DateTime<Utc>) -> Option<Arc<Broker>> {
        for broker in self.brokers() {
            if !broker.is_active() || broker.task().is_some() {
                continue;
            }
            let failover = broker.failover();
            if failover.is_max_tries_exceeded() {
                debug!(broker = %broker.id, failures = failover.failures(), "skipping broker with exhausted retries");
                continue;
            }

            let siblings = self.sibling_attributes(&broker.id);
            if broker.should_start(offer, &siblings, now) {
                debug!(broker = %broker.id, host = %offer.hostname, "offer matched");
                return Some(broker);
            }
        }
        None
    }

    /// Attach a new task for `broker` on `offer`. The caller issues the launch.
    pub fn launch(&self, broker: &Broker, offer: &ResourceOffer) -> SchedulerResult<Arc<Task>> {
        let task = broker.attach_task(Task::from_offer(next_task_id(&broker.id), offer))?;
        info!(
            broker = %broker.id,
            task = %task.id,
            endpoint = %task.endpoint(),
            "broker launched"
        );
        Ok(task)
    }

    /// Inactive brokers whose task still needs to be killed.
    pub fn brokers_to_kill(&self) -> Vec<(Arc<Broker>, Arc<Task>)> {
        self.brokers()
            .into_iter()
            .filter(|b| b.should_stop())
            .filter_map(|b| b.task().map(|t| (b, t)))
            .collect()
    }

    // ── Status updates ─────────────────────────────────────────────

    /// Apply a task status update.
    ///
    /// Fails only when `task_id` cannot be parsed. Updates for unknown
    /// brokers or replaced tasks are logged and ignored.
    pub fn on_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> SchedulerResult<StatusOutcome> {
        let broker_id = id_from_task_id(task_id)?;
        let Some(broker) = self.broker(broker_id) else {
            warn!(broker = %broker_id, task = %task_id, ?status, "status for unknown broker");
            return Ok(StatusOutcome::Ignored);
        };
        let Some(task) = broker.task().filter(|t| t.id == task_id) else {
            warn!(broker = %broker_id, task = %task_id, ?status, "status for stale task");
            return Ok(StatusOutcome::Ignored);
        };

        match status {
            TaskStatus::Staging | TaskStatus::Starting => Ok(StatusOutcome::Unchanged),
            TaskStatus::Running => {
                task.set_running(true);
                broker.reset_failures();
                info!(broker = %broker.id, task = %task_id, "broker started");
                Ok(StatusOutcome::Started)
            }
            TaskStatus::Finished | TaskStatus::Killed => {
                broker.clear_task_if(task_id);
                info!(broker = %broker.id, task = %task_id, ?status, "broker stopped");
                Ok(StatusOutcome::Stopped)
            }
            TaskStatus::Failed | TaskStatus::Lost | TaskStatus::Error => {
                broker.clear_task_if(task_id);
                if !broker.is_active() {
                    info!(broker = %broker.id, task = %task_id, ?status, "broker stopped");
                    return Ok(StatusOutcome::Stopped);
                }

                let failover = broker.register_failure(now);
                let failures = failover.failures();
                if failover.is_max_tries_exceeded() {
                    warn!(
                        broker = %broker.id,
                        failures,
                        max_tries = ?failover.max_tries,
                        "broker failed and exhausted its retries"
                    );
                    return Ok(StatusOutcome::RetriesExhausted { failures });
                }

                let next_start = failover.delay_expires().unwrap_or(now);
                info!(broker = %broker.id, task = %task_id, ?status, failures, %next_start, "broker failed");
                Ok(StatusOutcome::Failed {
                    failures,
                    next_start,
                })
            }
        }
    }

    // ── Persistence ────────────────────────────────────────────────

    pub fn to_record(&self) -> ClusterRecord {
        ClusterRecord {
            framework_id: self.framework_id(),
            brokers: self
                .brokers()
                .iter()
                .map(|b| BrokerRecord::from(b.as_ref()))
                .collect(),
        }
    }

    pub fn from_record(record: ClusterRecord) -> SchedulerResult<Self> {
        let cluster = Cluster::new();
        cluster.set_framework_id(record.framework_id);
        for broker in record.brokers {
            cluster.add_broker(Broker::try_from(broker)?)?;
        }
        Ok(cluster)
    }

    pub fn to_json_string(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn from_json_str(s: &str) -> SchedulerResult<Self> {
        let record: ClusterRecord = serde_json::from_str(s)?;
        Self::from_record(record)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use brokerd_placement::{CPUS, Constraint, MEM};
    use chrono::{TimeDelta, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn config() -> SchedulerConfig {
        let mut config = SchedulerConfig::default();
        config.broker.cpus = 0.5;
        config.broker.mem = 128;
        config.failover.delay = Duration::from_secs(10);
        config.failover.max_delay = Duration::from_secs(60);
        config
    }

    fn offer(host: &str) -> ResourceOffer {
        ResourceOffer::new(host)
            .with_resource(CPUS, 1.0)
            .with_resource(MEM, 256.0)
            .with_ports(31000, 32000)
    }

    fn cluster_with(ids: &[&str]) -> Cluster {
        let cluster = Cluster::new();
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        for broker in cluster.add_brokers(&ids, &config()).unwrap() {
            broker.set_active(true);
        }
        cluster
    }

    fn launch_on(cluster: &Cluster, id: &str, offer: &ResourceOffer) -> Arc<Task> {
        let broker = cluster.broker(id).unwrap();
        cluster.launch(&broker, offer).unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let cluster = cluster_with(&["0"]);
        assert!(matches!(
            cluster.add_broker(Broker::new("0", &config())),
            Err(SchedulerError::DuplicateBroker(id)) if id == "0"
        ));
        assert!(cluster.add_brokers(&["1".to_string(), "0".to_string()], &config()).is_err());
        assert_eq!(cluster.brokers().len(), 1);
    }

    #[test]
    fn remove_requires_stopped_broker() {
        let cluster = cluster_with(&["0"]);
        assert!(matches!(
            cluster.remove_broker("0"),
            Err(SchedulerError::BrokerActive(_))
        ));

        cluster.broker("0").unwrap().set_active(false);
        cluster.remove_broker("0").unwrap();
        assert!(cluster.broker("0").is_none());
        assert!(matches!(
            cluster.remove_broker("0"),
            Err(SchedulerError::BrokerNotFound(_))
        ));
    }

    #[test]
    fn update_replaces_stopped_broker() {
        let cluster = cluster_with(&["0"]);
        assert!(cluster.update_broker("0", |b| b.heap = 1).is_err());

        let old = cluster.broker("0").unwrap();
        old.set_active(false);
        let updated = cluster
            .update_broker("0", |b| {
                b.heap = 512;
                b.requirements.host = Some(Constraint::Unique);
            })
            .unwrap();

        assert_eq!(updated.heap, 512);
        assert_eq!(cluster.broker("0").unwrap().heap, 512);
        assert_eq!(old.heap, 1024);
    }

    #[test]
    fn expand_ids_handles_lists_ranges_and_wildcard() {
        let cluster = cluster_with(&["a", "b"]);
        assert_eq!(cluster.expand_ids("*").unwrap(), ["a", "b"]);
        assert_eq!(cluster.expand_ids("0..2").unwrap(), ["0", "1", "2"]);
        assert_eq!(cluster.expand_ids("5, 0..1, 5").unwrap(), ["5", "0", "1"]);
        assert_eq!(cluster.expand_ids("x").unwrap(), ["x"]);

        for bad in ["", "1,,2", "3..1", "a..2", "1.."] {
            assert!(
                matches!(cluster.expand_ids(bad), Err(SchedulerError::InvalidIdExpression(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn expand_ids_caps_range_width() {
        let cluster = Cluster::new();
        let max = MAX_RANGE_IDS - 1;
        assert_eq!(cluster.expand_ids(&format!("0..{max}")).unwrap().len() as u64, MAX_RANGE_IDS);
        for bad in [format!("0..{MAX_RANGE_IDS}"), format!("0..{}", u64::MAX)] {
            assert!(matches!(
                cluster.expand_ids(&bad),
                Err(SchedulerError::InvalidIdExpression(_))
            ));
        }
    }

    #[test]
    fn broker_ids_cannot_contain_dashes() {
        let cluster = Cluster::new();
        for bad in ["kafka-1", ""] {
            assert!(matches!(
                cluster.add_broker(Broker::new(bad, &config())),
                Err(SchedulerError::InvalidBrokerId(id)) if id == bad
            ));
        }
        assert!(matches!(
            cluster.expand_ids("0,kafka-1"),
            Err(SchedulerError::InvalidBrokerId(_))
        ));
        assert!(cluster.add_brokers(&["1".to_string(), "a-b".to_string()], &config()).is_err());
        assert!(cluster.brokers().is_empty());
    }

    #[test]
    fn named_broker_receives_status_updates() {
        let cluster = cluster_with(&["kafka1"]);
        let task = launch_on(&cluster, "kafka1", &offer("node1"));
        assert_eq!(
            cluster.on_task_status(&task.id, TaskStatus::Running, t0()).unwrap(),
            StatusOutcome::Started
        );
        assert!(task.is_running());
    }

    #[test]
    fn first_fit_in_registration_order() {
        let cluster = cluster_with(&["0", "1"]);
        let chosen = cluster.match_offer(&offer("node1"), t0()).unwrap();
        assert_eq!(chosen.id, "0");

        cluster.launch(&chosen, &offer("node1")).unwrap();
        let next = cluster.match_offer(&offer("node2"), t0()).unwrap();
        assert_eq!(next.id, "1");

        launch_on(&cluster, "1", &offer("node2"));
        assert!(cluster.match_offer(&offer("node3"), t0()).is_none());
    }

    #[test]
    fn launch_snapshots_offer() {
        let cluster = cluster_with(&["4"]);
        let task = launch_on(&cluster, "4", &offer("node1").with_attribute("rack", "r1"));

        assert!(task.id.starts_with("broker-4-"));
        assert_eq!(task.host, "node1");
        assert_eq!(task.port, 31000);
        assert_eq!(task.attribute("rack"), Some("r1"));
        assert!(cluster.launch(&cluster.broker("4").unwrap(), &offer("node1")).is_err());
    }

    #[test]
    fn sibling_attributes_exclude_self() {
        let cluster = cluster_with(&["0", "1", "2"]);
        launch_on(&cluster, "0", &offer("node1").with_attribute("rack", "r1"));
        launch_on(&cluster, "1", &offer("node2").with_attribute("rack", "r2"));

        let for_zero = cluster.sibling_attributes("0");
        assert_eq!(for_zero.claimed("host"), ["node2"]);
        assert_eq!(for_zero.claimed("rack"), ["r2"]);
        assert!(for_zero.claimed("zone").is_empty());

        let for_two = cluster.sibling_attributes("2");
        assert_eq!(for_two.claimed("host"), ["node1", "node2"]);
    }

    #[test]
    fn unique_host_constraint_uses_siblings() {
        let cluster = cluster_with(&["0"]);
        let mut spread = Broker::new("1", &config());
        spread.requirements.host = Some(Constraint::Unique);
        cluster.add_broker(spread).unwrap().set_active(true);

        launch_on(&cluster, "0", &offer("node1"));
        assert!(cluster.match_offer(&offer("node1"), t0()).is_none());
        assert_eq!(cluster.match_offer(&offer("node2"), t0()).unwrap().id, "1");
    }

    #[test]
    fn running_status_resets_failures() {
        let cluster = cluster_with(&["0"]);
        let broker = cluster.broker("0").unwrap();
        broker.register_failure(t0());

        let task = launch_on(&cluster, "0", &offer("node1"));
        let outcome = cluster
            .on_task_status(&task.id, TaskStatus::Running, t0())
            .unwrap();

        assert_eq!(outcome, StatusOutcome::Started);
        assert!(task.is_running());
        assert_eq!(broker.failover().failures(), 0);
        assert_eq!(broker.state(t0()).to_string(), "running");
    }

    #[test]
    fn abnormal_exit_registers_failure() {
        let cluster = cluster_with(&["0"]);
        let broker = cluster.broker("0").unwrap();
        let task = launch_on(&cluster, "0", &offer("node1"));

        let outcome = cluster
            .on_task_status(&task.id, TaskStatus::Failed, t0())
            .unwrap();

        assert_eq!(
            outcome,
            StatusOutcome::Failed {
                failures: 1,
                next_start: t0() + TimeDelta::seconds(10)
            }
        );
        assert!(broker.task().is_none());
        assert!(cluster.match_offer(&offer("node1"), t0() + TimeDelta::seconds(5)).is_none());
        assert!(cluster.match_offer(&offer("node1"), t0() + TimeDelta::seconds(10)).is_some());
    }

    #[test]
    fn normal_exit_does_not_count_as_failure() {
        let cluster = cluster_with(&["0"]);
        let broker = cluster.broker("0").unwrap();
        let task = launch_on(&cluster, "0", &offer("node1"));

        let outcome = cluster
            .on_task_status(&task.id, TaskStatus::Finished, t0())
            .unwrap();
        assert_eq!(outcome, StatusOutcome::Stopped);
        assert!(broker.task().is_none());
        assert_eq!(broker.failover().failures(), 0);
    }

    #[test]
    fn failure_of_inactive_broker_is_a_stop() {
        let cluster = cluster_with(&["0"]);
        let broker = cluster.broker("0").unwrap();
        let task = launch_on(&cluster, "0", &offer("node1"));
        broker.set_active(false);

        assert_eq!(cluster.brokers_to_kill().len(), 1);
        let outcome = cluster
            .on_task_status(&task.id, TaskStatus::Lost, t0())
            .unwrap();
        assert_eq!(outcome, StatusOutcome::Stopped);
        assert_eq!(broker.failover().failures(), 0);
        assert!(cluster.brokers_to_kill().is_empty());
        assert_eq!(broker.state(t0()).to_string(), "stopped");
    }

    #[test]
    fn exhausted_retries_are_advisory() {
        let cluster = cluster_with(&["0"]);
        let broker = cluster.broker("0").unwrap();
        broker.update_failover(|f| f.max_tries = Some(2));

        let first = launch_on(&cluster, "0", &offer("node1"));
        cluster.on_task_status(&first.id, TaskStatus::Failed, t0()).unwrap();

        let later = t0() + TimeDelta::minutes(5);
        let second = launch_on(&cluster, "0", &offer("node1"));
        let outcome = cluster
            .on_task_status(&second.id, TaskStatus::Error, later)
            .unwrap();

        assert_eq!(outcome, StatusOutcome::RetriesExhausted { failures: 2 });
        assert!(broker.is_active());
        assert!(cluster.match_offer(&offer("node1"), later + TimeDelta::hours(1)).is_none());
    }

    #[test]
    fn stale_and_unknown_updates_are_ignored() {
        let cluster = cluster_with(&["0"]);
        let broker = cluster.broker("0").unwrap();
        let task = launch_on(&cluster, "0", &offer("node1"));

        let stale = cluster
            .on_task_status("broker-0-old", TaskStatus::Failed, t0())
            .unwrap();
        assert_eq!(stale, StatusOutcome::Ignored);
        assert_eq!(broker.task().unwrap().id, task.id);

        let unknown = cluster
            .on_task_status("broker-9-x", TaskStatus::Running, t0())
            .unwrap();
        assert_eq!(unknown, StatusOutcome::Ignored);
    }

    #[test]
    fn malformed_task_id_is_an_error() {
        let cluster = cluster_with(&["0"]);
        assert!(matches!(
            cluster.on_task_status("broker", TaskStatus::Running, t0()),
            Err(SchedulerError::Core(_))
        ));
    }

    #[test]
    fn starting_status_changes_nothing() {
        let cluster = cluster_with(&["0"]);
        let task = launch_on(&cluster, "0", &offer("node1"));
        let outcome = cluster
            .on_task_status(&task.id, TaskStatus::Starting, t0())
            .unwrap();
        assert_eq!(outcome, StatusOutcome::Unchanged);
        assert!(!task.is_running());
    }

    #[test]
    fn status_flags() {
        assert!(TaskStatus::Killed.is_terminal());
        assert!(!TaskStatus::Killed.is_abnormal());
        assert!(TaskStatus::Lost.is_abnormal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn cluster_json_round_trip() {
        let cluster = cluster_with(&["0", "1"]);
        cluster.set_framework_id(Some("fw-1".to_string()));
        let task = launch_on(&cluster, "1", &offer("node2").with_attribute("rack", "r2"));
        task.set_running(true);
        cluster.broker("0").unwrap().register_failure(t0());

        let restored = Cluster::from_json_str(&cluster.to_json_string().unwrap()).unwrap();
        assert_eq!(restored.framework_id().as_deref(), Some("fw-1"));
        assert_eq!(restored.to_record(), cluster.to_record());
        assert!(restored.broker("1").unwrap().task().unwrap().is_running());
    }

    #[test]
    fn cluster_json_rejects_duplicate_brokers() {
        let cluster = cluster_with(&["0"]);
        let mut record = cluster.to_record();
        record.brokers.push(record.brokers[0].clone());
        assert!(matches!(
            Cluster::from_record(record),
            Err(SchedulerError::DuplicateBroker(_))
        ));
    }
}
