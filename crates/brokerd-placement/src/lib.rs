//! brokerd placement — decides whether a resource offer can host a broker.
//!
//! This crate is pure decision logic: it never talks to the resource manager.
//! Each broker is matched independently against one offer at a time.
//!
//! # Components
//!
//! - **`constraint`** — Predicates over a single attribute value
//! - **`offer`** — Read-only view of a resource offer
//! - **`registry`** — Lookup of attribute values already claimed by sibling brokers
//! - **`matcher`** — Resource and constraint checks against an offer

pub mod constraint;
pub mod matcher;
pub mod offer;
pub mod registry;

pub use constraint::{Constraint, ConstraintError};
pub use matcher::{Mismatch, PlacementRequirements};
pub use offer::{CPUS, MEM, PortRange, ResourceOffer};
pub use registry::{AttributeRegistry, HOST_ATTRIBUTE, NoClaims};
