//! Attribute values already claimed by sibling brokers.
//!
//! Cluster-aware constraints (`unique`, `cluster`, `groupBy`) need to know
//! which values other brokers' running tasks hold. The matcher asks for them
//! through [`AttributeRegistry`] instead of reaching into shared state.

use std::collections::HashMap;

/// Pseudo-attribute name used for the host constraint.
pub const HOST_ATTRIBUTE: &str = "host";

/// Lookup of attribute values held by other brokers.
pub trait AttributeRegistry {
    /// Values currently claimed for `name`, one entry per holding broker.
    fn claimed(&self, name: &str) -> Vec<String>;
}

/// A registry with no claims, for brokers matched in isolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClaims;

impl AttributeRegistry for NoClaims {
    fn claimed(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }
}

impl AttributeRegistry for HashMap<String, Vec<String>> {
    fn claimed(&self, name: &str) -> Vec<String> {
        self.get(name).cloned().unwrap_or_default()
    }
}
