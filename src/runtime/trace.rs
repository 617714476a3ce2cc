//! Execution traces
//!
//! A `Trace` is the ordered record of resolved sites from one model run.
//! Fingerprints are computed deterministically from site names and values
//! with Blake3, so two runs under the same seed compare equal.

use blake3::Hasher;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::distribution::DistributionRef;
use super::error::Result;
use super::message::{Message, Scratch, SiteKind};
use super::messenger::MessengerId;
use super::tensor::Tensor;

/// One resolved site
#[derive(Debug, Clone)]
pub struct Site {
    /// Site name
    pub name: String,
    /// Primitive kind
    pub kind: SiteKind,
    /// Distribution the value was drawn from or scored against
    pub distribution: DistributionRef,
    /// Resolved value
    pub value: Tensor,
    /// Whether the value was treated as data
    pub is_observed: bool,
    /// Intervention instance that claimed the site, if any
    pub intervener_id: Option<MessengerId>,
    /// Messenger metadata at the time of recording
    pub scratch: Scratch,
}

impl Site {
    /// Capture a resolved message; `None` when the message has no value
    pub fn from_message(msg: &Message) -> Option<Self> {
        let value = msg.value.clone()?;
        Some(Self {
            name: msg.name.clone(),
            kind: msg.kind,
            distribution: msg.distribution.clone(),
            value,
            is_observed: msg.is_observed,
            intervener_id: msg.intervener_id,
            scratch: msg.scratch.clone(),
        })
    }

    /// Log density of the recorded value
    pub fn log_prob(&self) -> Result<f64> {
        Ok(self.distribution.log_prob(&self.value)?)
    }
}

/// Ordered, name-indexed record of sites
#[derive(Debug, Clone)]
pub struct Trace {
    sites: Vec<Site>,
    index: HashMap<String, usize>,
    /// Debug timestamp (not part of the fingerprint)
    pub recorded_at: DateTime<Utc>,
}

impl Trace {
    /// Empty trace
    pub fn new() -> Self {
        Self {
            sites: Vec::new(),
            index: HashMap::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Record a site; a site with an existing name replaces the old record
    pub fn insert(&mut self, site: Site) {
        match self.index.get(&site.name) {
            Some(&pos) => {
                tracing::debug!(site = %site.name, "replacing duplicate trace site");
                self.sites[pos] = site;
            }
            None => {
                self.index.insert(site.name.clone(), self.sites.len());
                self.sites.push(site);
            }
        }
    }

    /// Look up a site by name
    pub fn get(&self, name: &str) -> Option<&Site> {
        self.index.get(name).map(|&pos| &self.sites[pos])
    }

    /// Whether a site with this name was recorded
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Site names in recording order
    pub fn names(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.name.as_str()).collect()
    }

    /// Iterate over sites in recording order
    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    /// Number of recorded sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the trace is empty
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Joint log density of all sample and observe sites
    pub fn log_prob_sum(&self) -> Result<f64> {
        let mut total = 0.0;
        for site in self.sites.iter().filter(|s| s.kind != SiteKind::Param) {
            total += site.log_prob()?;
        }
        Ok(total)
    }

    /// Deterministic digest of site names, kinds, and values
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        for site in &self.sites {
            hasher.update(site.name.as_bytes());
            hasher.update(&[site.kind as u8, site.is_observed as u8]);
            for dim in site.value.shape() {
                hasher.update(&(*dim as u64).to_le_bytes());
            }
            for x in site.value.data() {
                hasher.update(&x.to_le_bytes());
            }
        }
        format!("trace_{}", hasher.finalize().to_hex())
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::distribution::Normal;
    use std::sync::Arc;

    fn site(name: &str, value: f64) -> Site {
        let mut msg = Message::sample(name, Arc::new(Normal::new(0.0, 1.0).unwrap()));
        msg.value = Some(Tensor::scalar(value));
        Site::from_message(&msg).unwrap()
    }

    #[test]
    fn test_unresolved_message_is_not_a_site() {
        let msg = Message::sample("x", Arc::new(Normal::new(0.0, 1.0).unwrap()));
        assert!(Site::from_message(&msg).is_none());
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut trace = Trace::new();
        trace.insert(site("a", 1.0));
        trace.insert(site("b", 2.0));
        trace.insert(site("a", 3.0));

        assert_eq!(trace.names(), vec!["a", "b"]);
        assert_eq!(trace.get("a").unwrap().value, Tensor::scalar(3.0));
        assert!(trace.contains("b") && !trace.contains("c"));
        let values: Vec<f64> = trace.iter().filter_map(|s| s.value.item()).collect();
        assert_eq!(values, vec![3.0, 2.0]);
    }

    #[test]
    fn test_fingerprint_tracks_values() {
        let mut t1 = Trace::new();
        t1.insert(site("a", 1.0));
        let mut t2 = Trace::new();
        t2.insert(site("a", 1.0));
        let mut t3 = Trace::new();
        t3.insert(site("a", 1.5));

        assert_eq!(t1.fingerprint(), t2.fingerprint());
        assert_ne!(t1.fingerprint(), t3.fingerprint());
    }

    #[test]
    fn test_log_prob_sum() {
        let mut trace = Trace::new();
        trace.insert(site("a", 0.0));
        trace.insert(site("b", 0.0));
        let single = Normal::new(0.0, 1.0).unwrap();
        let expected = 2.0
            * crate::runtime::distribution::Distribution::log_prob(&single, &Tensor::scalar(0.0))
                .unwrap();
        assert!((trace.log_prob_sum().unwrap() - expected).abs() < 1e-12);
    }
}
