//! Messenger capability and scoped installation
//!
//! A messenger intercepts messages through a pre-hook (innermost first) and a
//! post-hook (outermost first). Messengers are shared as `Arc<dyn Messenger>`
//! and hooks take `&self`, so a hook may re-enter the stack applier while the
//! outer traversal still holds the same handle. Mutable messenger state lives
//! behind a lock, as with entities attached to an actor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Runtime;
use super::error::Result;
use super::message::{Message, SiteKind};

static NEXT_MESSENGER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique messenger instance identifier, assigned in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessengerId(u64);

impl MessengerId {
    /// Allocate the next identifier
    pub fn fresh() -> Self {
        Self(NEXT_MESSENGER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessengerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "messenger#{}", self.0)
    }
}

/// A composable transformation over primitive sites
///
/// Returning without touching `done`/`value` makes a hook a pass-through.
/// Hooks must leave `value` alone once `done` is set.
pub trait Messenger: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Phase-1 hook; dispatches on the message kind by default
    fn pre_hook(&self, rt: &Runtime, msg: &mut Message) -> Result<()> {
        match msg.kind {
            SiteKind::Sample | SiteKind::Observe => self.pre_sample(rt, msg),
            SiteKind::Param => self.pre_param(rt, msg),
        }
    }

    /// Phase-2 hook; dispatches on the message kind by default
    fn post_hook(&self, rt: &Runtime, msg: &mut Message) -> Result<()> {
        match msg.kind {
            SiteKind::Sample | SiteKind::Observe => self.post_sample(rt, msg),
            SiteKind::Param => self.post_param(rt, msg),
        }
    }

    /// Pre-hook for sample and observe sites
    fn pre_sample(&self, _rt: &Runtime, _msg: &mut Message) -> Result<()> {
        Ok(())
    }

    /// Post-hook for sample and observe sites
    fn post_sample(&self, _rt: &Runtime, _msg: &mut Message) -> Result<()> {
        Ok(())
    }

    /// Pre-hook for param sites
    fn pre_param(&self, _rt: &Runtime, _msg: &mut Message) -> Result<()> {
        Ok(())
    }

    /// Post-hook for param sites
    fn post_param(&self, _rt: &Runtime, _msg: &mut Message) -> Result<()> {
        Ok(())
    }

    /// Called right after the messenger is pushed
    fn on_enter(&self, _rt: &Runtime) {}

    /// Called right after the messenger is popped
    fn on_exit(&self, _rt: &Runtime) {}
}

/// Shared handle to an installed messenger
pub type MessengerRef = Arc<dyn Messenger>;

/// RAII guard keeping a messenger on the stack
///
/// Dropping the guard pops the messenger, including during unwinding and
/// early `?` returns.
#[must_use = "the messenger is popped as soon as the scope guard is dropped"]
pub struct MessengerScope<'rt> {
    rt: &'rt Runtime,
    messenger: MessengerRef,
}

impl<'rt> MessengerScope<'rt> {
    pub(crate) fn new(rt: &'rt Runtime, messenger: MessengerRef) -> Self {
        rt.stack().push(messenger.clone());
        tracing::debug!(messenger = messenger.name(), depth = rt.stack().len(), "push");
        messenger.on_enter(rt);
        Self { rt, messenger }
    }
}

impl Drop for MessengerScope<'_> {
    fn drop(&mut self) {
        self.rt.stack().pop(&self.messenger);
        tracing::debug!(
            messenger = self.messenger.name(),
            depth = self.rt.stack().len(),
            "pop"
        );
        self.messenger.on_exit(self.rt);
    }
}
