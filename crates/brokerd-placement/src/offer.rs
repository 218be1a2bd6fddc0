//! Read-only view of a resource offer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Scalar resource name for CPU shares.
pub const CPUS: &str = "cpus";
/// Scalar resource name for memory (MiB).
pub const MEM: &str = "mem";

/// An inclusive range of offered ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub begin: u16,
    pub end: u16,
}

/// What the resource manager offers on one host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceOffer {
    pub hostname: String,
    /// Scalar resources by name (`cpus`, `mem`, ...). Amounts are non-negative.
    pub resources: HashMap<String, f64>,
    /// Host attributes (`rack`, `zone`, ...).
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortRange>,
}

impl ResourceOffer {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    pub fn with_resource(mut self, name: impl Into<String>, amount: f64) -> Self {
        self.resources.insert(name.into(), amount);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_ports(mut self, begin: u16, end: u16) -> Self {
        self.ports.push(PortRange { begin, end });
        self
    }

    pub fn resource(&self, name: &str) -> Option<f64> {
        self.resources.get(name).copied()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Lowest port of the first non-empty offered range.
    pub fn first_port(&self) -> Option<u16> {
        self.ports
            .iter()
            .find(|r| r.begin <= r.end)
            .map(|r| r.begin)
    }
}
