//! Task — the live assignment of a broker to a host.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use brokerd_placement::ResourceOffer;

/// A launched broker instance.
///
/// Everything except `running` is fixed at launch. `running` is flipped by
/// status updates; the store uses `Release` and every read `Acquire`, so a
/// reader that sees `true` also sees everything the status handler wrote
/// before it.
#[derive(Debug)]
pub struct Task {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Offer attributes at launch time.
    pub attributes: BTreeMap<String, String>,
    running: AtomicBool,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            attributes,
            running: AtomicBool::new(false),
        }
    }

    /// Build a task for an accepted offer.
    ///
    /// Takes the first offered port, or 0 when the offer carries none (the
    /// worker then binds its own default).
    pub fn from_offer(id: impl Into<String>, offer: &ResourceOffer) -> Self {
        let attributes = offer
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::new(id, offer.hostname.clone(), offer.first_port().unwrap_or(0), attributes)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `host:port` endpoint of the worker.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Clone for Task {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.port,
            attributes: self.attributes.clone(),
            running: AtomicBool::new(self.is_running()),
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.host == other.host
            && self.port == other.port
            && self.attributes == other.attributes
            && self.is_running() == other.is_running()
    }
}
