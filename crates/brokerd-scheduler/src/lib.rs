//! brokerd-scheduler — broker lifecycle and failover decisions.
//!
//! Reacts to resource offers and task status updates delivered by an external
//! event loop. Nothing here talks to the network or disk; the caller turns
//! decisions into launch and kill calls.
//!
//! # Architecture
//!
//! ```text
//! Cluster
//!   ├── match_offer(offer) ──► Broker::should_start
//!   │                            ├── active && no task
//!   │                            ├── !Failover::is_waiting_delay
//!   │                            └── PlacementRequirements::matches (SiblingAttributes)
//!   ├── launch(broker, offer) ─► Task
//!   └── on_task_status(id, status)
//!         ├── Running  → task.running = true, reset failures
//!         ├── Finished / Killed → clear task
//!         └── Failed / Lost / Error → clear task, register failure
//! ```
//!
//! `Broker::state` derives the operator-facing lifecycle text and
//! `Broker::wait_for` gives callers a bounded "did it come up" check.

pub mod broker;
pub mod cluster;
pub mod error;
pub mod failover;
pub mod task;
pub mod wire;

pub use broker::{Broker, BrokerState};
pub use cluster::{Cluster, ClusterRecord, SiblingAttributes, StatusOutcome, TaskStatus};
pub use error::{SchedulerError, SchedulerResult};
pub use failover::Failover;
pub use task::Task;
pub use wire::{BrokerRecord, FailoverRecord, TaskRecord};
