//! Broker — one desired worker and everything the scheduler knows about it.
//!
//! A broker combines its placement requirements, worker options and failover
//! policy with two pieces of live state: the `active` intent flag and the
//! current task. The live state is shared between offer, status and operator
//! handlers, so it sits behind per-field synchronization:
//!
//! ```text
//! Broker
//!   ├── active: AtomicBool                   (operator intent)
//!   ├── task: RwLock<Option<Arc<Task>>>      (swapped whole, never edited in place)
//!   │     └── running: AtomicBool            (status updates)
//!   └── failover: Mutex<Failover>            (register / reset are atomic units)
//! ```
//!
//! There are no multi-field transactions. Callers that need "clear task and
//! register failure" as one step serialize per broker themselves.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use brokerd_core::SchedulerConfig;
use brokerd_placement::{AttributeRegistry, PlacementRequirements, ResourceOffer};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::failover::Failover;
use crate::task::Task;

/// Worker option naming its data directories.
pub const LOG_DIRS_OPTION: &str = "log.dirs";
/// Used when `log.dirs` is not set.
pub const DEFAULT_LOG_DIRS: &str = "broker-logs";
/// Replaced by the broker id in option values.
pub const ID_PLACEHOLDER: &str = "$id";

/// Poll interval for [`Broker::wait_for`] unless configured otherwise.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(100);

const STATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";

#[derive(Debug)]
pub struct Broker {
    pub id: String,
    pub requirements: PlacementRequirements,
    /// Worker heap in MiB.
    pub heap: u64,
    /// Options passed to the worker process, in declaration order.
    pub options: IndexMap<String, String>,
    /// Poll interval used by [`Broker::wait_for`]. Not persisted.
    pub wait_interval: Duration,
    active: AtomicBool,
    failover: Mutex<Failover>,
    task: RwLock<Option<Arc<Task>>>,
}

/// Human-facing lifecycle state, derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerState {
    Stopped,
    /// Inactive, but the task is still being torn down.
    Stopping,
    Running,
    /// Inside the backoff window after a failure.
    Failed {
        failures: u32,
        max_tries: Option<u32>,
        failed_at: DateTime<Utc>,
        next_start: DateTime<Utc>,
    },
    /// Backoff elapsed; the next launch is retry number `attempt`.
    Retrying {
        attempt: u32,
        max_tries: Option<u32>,
        failed_at: DateTime<Utc>,
    },
    Starting,
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerState::Stopped => f.write_str("stopped"),
            BrokerState::Stopping => f.write_str("stopping"),
            BrokerState::Running => f.write_str("running"),
            BrokerState::Failed {
                failures,
                max_tries,
                failed_at,
                next_start,
            } => {
                write!(f, "failed {failures}")?;
                if let Some(max) = max_tries {
                    write!(f, "/{max}")?;
                }
                write!(
                    f,
                    " {}, next start {}",
                    failed_at.format(STATE_TIME_FORMAT),
                    next_start.format(STATE_TIME_FORMAT)
                )
            }
            BrokerState::Retrying {
                attempt,
                max_tries,
                failed_at,
            } => {
                write!(f, "starting {attempt}")?;
                if let Some(max) = max_tries {
                    write!(f, "/{max}")?;
                }
                write!(f, ", failed {}", failed_at.format(STATE_TIME_FORMAT))
            }
            BrokerState::Starting => f.write_str("starting"),
        }
    }
}

impl Broker {
    /// Create an inactive broker with the configured defaults.
    pub fn new(id: impl Into<String>, config: &SchedulerConfig) -> Self {
        let mut broker = Self::with_parts(
            id.into(),
            PlacementRequirements::new(config.broker.cpus, config.broker.mem),
            config.broker.heap,
            Failover::from_defaults(&config.failover),
        );
        broker.wait_interval = config.wait.poll_interval;
        broker
    }

    pub(crate) fn with_parts(
        id: String,
        requirements: PlacementRequirements,
        heap: u64,
        failover: Failover,
    ) -> Self {
        Self {
            id,
            requirements,
            heap,
            options: IndexMap::new(),
            wait_interval: DEFAULT_WAIT_INTERVAL,
            active: AtomicBool::new(false),
            failover: Mutex::new(failover),
            task: RwLock::new(None),
        }
    }

    // ── Live state ─────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        let was = self.active.swap(active, Ordering::AcqRel);
        if was != active {
            debug!(broker = %self.id, active, "broker intent changed");
        }
    }

    /// The current task, if any.
    pub fn task(&self) -> Option<Arc<Task>> {
        self.task.read().clone()
    }

    /// Attach a freshly launched task.
    pub fn attach_task(&self, task: Task) -> SchedulerResult<Arc<Task>> {
        let mut slot = self.task.write();
        if slot.is_some() {
            return Err(SchedulerError::TaskAlreadyAssigned(self.id.clone()));
        }
        let task = Arc::new(task);
        *slot = Some(task.clone());
        Ok(task)
    }

    /// Drop the current task regardless of its id.
    pub fn clear_task(&self) -> Option<Arc<Task>> {
        self.task.write().take()
    }

    /// Drop the current task only if it is still `task_id`.
    ///
    /// A late status update for an old task must not detach its replacement.
    pub fn clear_task_if(&self, task_id: &str) -> Option<Arc<Task>> {
        let mut slot = self.task.write();
        if slot.as_ref().is_some_and(|t| t.id == task_id) {
            slot.take()
        } else {
            None
        }
    }

    pub(crate) fn restore_task(&self, task: Option<Task>) {
        *self.task.write() = task.map(Arc::new);
    }

    /// Snapshot of the failover policy and counters.
    pub fn failover(&self) -> Failover {
        self.failover.lock().clone()
    }

    /// Edit the failover under its lock.
    pub fn update_failover<R>(&self, f: impl FnOnce(&mut Failover) -> R) -> R {
        f(&mut self.failover.lock())
    }

    /// Record an abnormal task exit; returns the updated failover.
    pub fn register_failure(&self, now: DateTime<Utc>) -> Failover {
        let mut failover = self.failover.lock();
        failover.register_failure(now);
        failover.clone()
    }

    pub fn reset_failures(&self) {
        self.failover.lock().reset_failures();
    }

    // ── Decisions ──────────────────────────────────────────────────

    /// Whether `offer` satisfies this broker's requirements.
    pub fn matches(&self, offer: &ResourceOffer, registry: &dyn AttributeRegistry) -> bool {
        self.requirements.matches(offer, registry)
    }

    /// Launch on `offer` now?
    pub fn should_start(
        &self,
        offer: &ResourceOffer,
        registry: &dyn AttributeRegistry,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_active() || self.task.read().is_some() {
            return false;
        }
        if self.failover.lock().is_waiting_delay(now) {
            debug!(broker = %self.id, "broker is in failover backoff");
            return false;
        }
        self.matches(offer, registry)
    }

    /// Whether the broker should be torn down. The caller issues the kill.
    pub fn should_stop(&self) -> bool {
        !self.is_active()
    }

    /// Derive the lifecycle state at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> BrokerState {
        let task = self.task();

        if !self.is_active() {
            return match task {
                Some(_) => BrokerState::Stopping,
                None => BrokerState::Stopped,
            };
        }

        if task.as_ref().is_some_and(|t| t.is_running()) {
            return BrokerState::Running;
        }

        let failover = self.failover();
        if let (Some(failed_at), Some(next_start)) =
            (failover.failure_time(), failover.delay_expires())
        {
            if now < next_start {
                return BrokerState::Failed {
                    failures: failover.failures(),
                    max_tries: failover.max_tries,
                    failed_at,
                    next_start,
                };
            }
            return BrokerState::Retrying {
                attempt: failover.failures().saturating_add(1),
                max_tries: failover.max_tries,
                failed_at,
            };
        }

        BrokerState::Starting
    }

    /// Options as handed to the worker: `$id` substituted, `log.dirs` defaulted.
    pub fn resolved_options(&self) -> IndexMap<String, String> {
        let mut resolved: IndexMap<String, String> = self
            .options
            .iter()
            .map(|(k, v)| (k.clone(), v.replace(ID_PLACEHOLDER, &self.id)))
            .collect();
        resolved
            .entry(LOG_DIRS_OPTION.to_string())
            .or_insert_with(|| DEFAULT_LOG_DIRS.to_string());
        resolved
    }

    // ── Waiting ────────────────────────────────────────────────────

    /// Wait until the task is running (`running = true`) or gone
    /// (`running = false`), polling every `wait_interval`.
    ///
    /// Returns `false` if `timeout` elapses first. A timeout too large to
    /// represent as a deadline waits indefinitely. Dropping the future
    /// cancels the wait.
    pub async fn wait_for(&self, running: bool, timeout: Duration) -> bool {
        self.wait_for_with_interval(running, timeout, self.wait_interval)
            .await
    }

    pub async fn wait_for_with_interval(
        &self,
        running: bool,
        timeout: Duration,
        interval: Duration,
    ) -> bool {
        if self.is_in_condition(running) {
            return true;
        }
        let interval = interval.max(Duration::from_millis(1));
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };
            tokio::time::sleep(pause).await;
            if self.is_in_condition(running) {
                return true;
            }
        }
    }

    fn is_in_condition(&self, running: bool) -> bool {
        match self.task() {
            Some(task) => running && task.is_running(),
            None => !running,
        }
    }
}

/// Copies the current values of every field, live state included.
impl Clone for Broker {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            requirements: self.requirements.clone(),
            heap: self.heap,
            options: self.options.clone(),
            wait_interval: self.wait_interval,
            active: AtomicBool::new(self.is_active()),
            failover: Mutex::new(self.failover()),
            task: RwLock::new(self.task().map(|t| Arc::new(Task::clone(&t)))),
        }
    }
}
