//! Messages: one primitive random-variable operation in flight
//!
//! A `Message` is created per primitive call, threaded by mutable reference
//! through every messenger hook, and dropped when the primitive returns.
//! Cloning is the shallow copy used to fork a site: the distribution handle
//! and continuation are shared, everything else is duplicated.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Runtime;
use super::distribution::DistributionRef;
use super::error::Result;
use super::messenger::MessengerId;
use super::tensor::Tensor;

/// Kind of primitive a message describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteKind {
    /// Latent random draw
    Sample,
    /// Draw conditioned on a supplied value
    Observe,
    /// Learnable parameter lookup
    Param,
}

/// Callback run once after the primitive and all post-hooks complete
pub type Continuation = Arc<dyn Fn(&Runtime, &mut Message) -> Result<()> + Send + Sync>;

/// Messenger-specific metadata keyed by name
pub type Scratch = BTreeMap<String, serde_json::Value>;

/// A primitive operation threading through the messenger stack
#[derive(Clone)]
pub struct Message {
    /// Primitive kind
    pub kind: SiteKind,

    /// Site name, unique within one execution
    pub name: String,

    /// Distribution the primitive draws from or scores against
    pub distribution: DistributionRef,

    /// Resolved value, once known
    pub value: Option<Tensor>,

    /// Whether `value` is treated as data
    pub is_observed: bool,

    /// A terminal value has been assigned; hooks must not overwrite it
    pub done: bool,

    /// Halt phase-1 traversal at the current messenger
    pub stop: bool,

    /// Runs after the primitive completes
    pub continuation: Option<Continuation>,

    /// Last intervention messenger that claimed this site
    pub intervener_id: Option<MessengerId>,

    /// Free-form metadata for individual messengers
    pub scratch: Scratch,
}

impl Message {
    /// Fresh message for a latent sample site
    pub fn sample(name: impl Into<String>, distribution: DistributionRef) -> Self {
        Self::new(SiteKind::Sample, name.into(), distribution, None)
    }

    /// Fresh message for an observed site
    pub fn observe(name: impl Into<String>, distribution: DistributionRef, value: Tensor) -> Self {
        let mut msg = Self::new(SiteKind::Observe, name.into(), distribution, Some(value));
        msg.is_observed = true;
        msg
    }

    /// Fresh message for a parameter site
    pub fn param(name: impl Into<String>, distribution: DistributionRef) -> Self {
        Self::new(SiteKind::Param, name.into(), distribution, None)
    }

    fn new(
        kind: SiteKind,
        name: String,
        distribution: DistributionRef,
        value: Option<Tensor>,
    ) -> Self {
        Self {
            kind,
            name,
            distribution,
            value,
            is_observed: false,
            done: false,
            stop: false,
            continuation: None,
            intervener_id: None,
            scratch: Scratch::new(),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("distribution", &self.distribution.name())
            .field("value", &self.value)
            .field("is_observed", &self.is_observed)
            .field("done", &self.done)
            .field("stop", &self.stop)
            .field("continuation", &self.continuation.is_some())
            .field("intervener_id", &self.intervener_id)
            .field("scratch", &self.scratch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::distribution::Normal;

    #[test]
    fn test_fresh_sample_message() {
        let msg = Message::sample("z", Arc::new(Normal::new(0.0, 1.0).unwrap()));
        assert_eq!(msg.kind, SiteKind::Sample);
        assert!(msg.value.is_none());
        assert!(!msg.done && !msg.stop && !msg.is_observed);
        assert!(msg.intervener_id.is_none());
    }

    #[test]
    fn test_clone_shares_distribution() {
        let mut msg = Message::observe(
            "x",
            Arc::new(Normal::new(0.0, 1.0).unwrap()),
            Tensor::scalar(0.5),
        );
        msg.scratch.insert("tag".into(), serde_json::json!(1));

        let mut copy = msg.clone();
        copy.name.push_str("__copy");
        copy.scratch.insert("tag".into(), serde_json::json!(2));

        assert!(Arc::ptr_eq(&msg.distribution, &copy.distribution));
        assert_eq!(msg.name, "x");
        assert_eq!(msg.scratch["tag"], serde_json::json!(1));
        assert!(copy.is_observed);
    }
}
