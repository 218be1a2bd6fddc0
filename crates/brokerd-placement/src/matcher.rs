//! Offer matching.
//!
//! Checks run cheapest and most selective first and stop at the first miss:
//! 1. Host constraint against the offer hostname
//! 2. Scalar resources (`cpus`, `mem`)
//! 3. Attribute constraints, in declaration order

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::constraint::Constraint;
use crate::offer::{CPUS, MEM, ResourceOffer};
use crate::registry::{AttributeRegistry, HOST_ATTRIBUTE};

/// What a broker needs from an offer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequirements {
    pub cpus: f64,
    /// Memory in MiB.
    pub mem: u64,
    /// Constraint on the offer hostname.
    pub host: Option<Constraint>,
    /// Attribute name → constraint, in declaration order.
    pub constraints: IndexMap<String, Constraint>,
}

/// Why an offer was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    Host {
        hostname: String,
    },
    Resource {
        name: &'static str,
        wanted: f64,
        offered: Option<f64>,
    },
    Attribute {
        name: String,
        value: Option<String>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Host { hostname } => write!(f, "hostname {hostname} rejected"),
            Mismatch::Resource {
                name,
                wanted,
                offered: Some(offered),
            } => write!(f, "{name} {offered} < {wanted}"),
            Mismatch::Resource { name, .. } => write!(f, "no {name} offered"),
            Mismatch::Attribute {
                name,
                value: Some(value),
            } => write!(f, "{name}={value} rejected"),
            Mismatch::Attribute { name, .. } => write!(f, "no {name} attribute"),
        }
    }
}

impl PlacementRequirements {
    pub fn new(cpus: f64, mem: u64) -> Self {
        Self {
            cpus,
            mem,
            host: None,
            constraints: IndexMap::new(),
        }
    }

    /// Check an offer, reporting the first failed check.
    pub fn check_offer(
        &self,
        offer: &ResourceOffer,
        registry: &dyn AttributeRegistry,
    ) -> Result<(), Mismatch> {
        if let Some(host) = &self.host {
            let claimed = registry.claimed(HOST_ATTRIBUTE);
            if !host.matches(Some(offer.hostname.as_str()), &claimed) {
                return Err(Mismatch::Host {
                    hostname: offer.hostname.clone(),
                });
            }
        }

        check_resource(offer, CPUS, self.cpus)?;
        check_resource(offer, MEM, self.mem as f64)?;

        for (name, constraint) in &self.constraints {
            let value = offer.attribute(name);
            let claimed = registry.claimed(name);
            if !constraint.matches(value, &claimed) {
                return Err(Mismatch::Attribute {
                    name: name.clone(),
                    value: value.map(str::to_string),
                });
            }
        }

        Ok(())
    }

    /// Whether the offer satisfies every requirement. Read-only.
    pub fn matches(&self, offer: &ResourceOffer, registry: &dyn AttributeRegistry) -> bool {
        match self.check_offer(offer, registry) {
            Ok(()) => true,
            Err(reason) => {
                debug!(host = %offer.hostname, %reason, "offer does not match");
                false
            }
        }
    }
}

fn check_resource(offer: &ResourceOffer, name: &'static str, wanted: f64) -> Result<(), Mismatch> {
    match offer.resource(name) {
        Some(offered) if offered >= wanted => Ok(()),
        offered => Err(Mismatch::Resource {
            name,
            wanted,
            offered,
        }),
    }
}
