//! Replaying recorded values

use crate::runtime::Runtime;
use crate::runtime::error::Result;
use crate::runtime::message::{Message, SiteKind};
use crate::runtime::messenger::Messenger;
use crate::runtime::trace::Trace;

/// Resolves latent sample sites from a previously recorded trace
///
/// A replayed site is marked `done`, which ends phase 1 here. Messengers
/// installed outside the replay skip their pre-hooks for it and the
/// primitive does not draw. Post-hooks still run on every messenger.
/// Observed sites keep their data.
pub struct ReplayMessenger {
    trace: Trace,
}

impl ReplayMessenger {
    /// Replay values from `trace`
    pub fn new(trace: Trace) -> Self {
        Self { trace }
    }
}

impl Messenger for ReplayMessenger {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn pre_sample(&self, _rt: &Runtime, msg: &mut Message) -> Result<()> {
        if msg.is_observed || msg.done {
            return Ok(());
        }
        if let Some(site) = self.trace.get(&msg.name).filter(|s| s.kind != SiteKind::Param) {
            msg.value = Some(site.value.clone());
            msg.done = true;
        }
        Ok(())
    }
}
