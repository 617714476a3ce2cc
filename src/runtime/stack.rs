//! Messenger stack and the stack applier
//!
//! `apply_stack` runs one message through every active messenger:
//!
//! 1. pre-hooks from the most recently pushed messenger outward, halting
//!    after a hook sets `stop` or `done`;
//! 2. the primitive itself, unless the value is already resolved;
//! 3. post-hooks in the reverse of phase-1 order;
//! 4. the message's continuation, if any.
//!
//! Traversal works on a snapshot of the stack, so a hook that re-enters
//! `apply_stack` with a forked message sees the same messengers. The nested
//! call runs to completion before the outer traversal resumes.

use parking_lot::RwLock;
use std::sync::Arc;

use super::Runtime;
use super::error::{Result, RuntimeError};
use super::message::{Message, SiteKind};
use super::messenger::MessengerRef;

/// Ordered list of installed messengers, innermost last
#[derive(Default)]
pub struct MessengerStack {
    frames: RwLock<Vec<MessengerRef>>,
}

impl MessengerStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, messenger: MessengerRef) {
        self.frames.write().push(messenger);
    }

    // Scopes nest, so the messenger is normally on top. If not, it is
    // removed from wherever it sits and the imbalance is logged.
    pub(crate) fn pop(&self, messenger: &MessengerRef) {
        let mut frames = self.frames.write();
        match frames.iter().rposition(|m| Arc::ptr_eq(m, messenger)) {
            Some(pos) if pos + 1 == frames.len() => {
                frames.pop();
            }
            Some(pos) => {
                tracing::warn!(
                    messenger = messenger.name(),
                    position = pos,
                    depth = frames.len(),
                    "messenger popped out of LIFO order"
                );
                frames.remove(pos);
            }
            None => {
                tracing::warn!(messenger = messenger.name(), "pop of messenger not on stack");
            }
        }
    }

    /// Number of installed messengers
    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    /// Whether no messenger is installed
    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }

    /// Copy of the current frames, outermost first
    pub fn snapshot(&self) -> Vec<MessengerRef> {
        self.frames.read().clone()
    }
}

/// Run `msg` through the runtime's messenger stack and resolve its value
pub fn apply_stack(rt: &Runtime, msg: &mut Message) -> Result<()> {
    let frames = rt.stack().snapshot();

    // Phase 1: innermost to outermost.
    let mut visited = 0;
    for messenger in frames.iter().rev() {
        visited += 1;
        tracing::trace!(messenger = messenger.name(), site = %msg.name, "pre_hook");
        messenger.pre_hook(rt, msg)?;
        if msg.stop || msg.done {
            break;
        }
    }

    default_process_message(rt, msg)?;

    // Phase 2: reverse of phase 1. A `stop` hides the site from messengers
    // that were never visited.
    let start = if msg.stop { frames.len() - visited } else { 0 };
    for messenger in &frames[start..] {
        tracing::trace!(messenger = messenger.name(), site = %msg.name, "post_hook");
        messenger.post_hook(rt, msg)?;
    }

    if let Some(continuation) = msg.continuation.take() {
        continuation(rt, msg)?;
    }

    if rt.config().debug {
        tracing::debug!(
            site = %msg.name,
            kind = ?msg.kind,
            observed = msg.is_observed,
            value = ?msg.value,
            messengers = frames.len(),
            "site resolved"
        );
    }

    Ok(())
}

/// Execute the primitive for a message that no messenger resolved
fn default_process_message(rt: &Runtime, msg: &mut Message) -> Result<()> {
    if msg.is_observed && msg.value.is_none() {
        return Err(RuntimeError::MissingObservedValue(msg.name.clone()));
    }

    if !(msg.done || msg.is_observed || msg.value.is_some()) {
        let value = match msg.kind {
            SiteKind::Param => rt.params().get_or_init(&msg.name, || rt.draw(&msg.distribution)),
            SiteKind::Sample | SiteKind::Observe => rt.draw(&msg.distribution),
        };
        msg.value = Some(value);
    }

    if rt.config().validate_shapes {
        if let Some(value) = &msg.value {
            let event_shape = msg.distribution.event_shape();
            if !value.shape_ends_with(event_shape) {
                return Err(RuntimeError::ShapeMismatch {
                    site: msg.name.clone(),
                    value_shape: value.shape().to_vec(),
                    event_shape: event_shape.to_vec(),
                });
            }
        }
    }

    msg.done = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeConfig;
    use crate::runtime::distribution::{Distribution, DistributionRef, Normal};
    use crate::runtime::messenger::Messenger;
    use crate::runtime::tensor::Tensor;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        log: Log,
        stop: bool,
    }

    impl Messenger for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn pre_sample(&self, _rt: &Runtime, msg: &mut Message) -> Result<()> {
            self.log.lock().push(format!("pre:{}", self.label));
            if self.stop {
                msg.stop = true;
            }
            Ok(())
        }

        fn post_sample(&self, _rt: &Runtime, _msg: &mut Message) -> Result<()> {
            self.log.lock().push(format!("post:{}", self.label));
            Ok(())
        }
    }

    fn recorder(label: &'static str, log: &Log, stop: bool) -> MessengerRef {
        Arc::new(Recorder {
            label,
            log: log.clone(),
            stop,
        })
    }

    fn normal() -> DistributionRef {
        Arc::new(Normal::new(0.0, 1.0).unwrap())
    }

    #[test]
    fn test_empty_stack_draws() {
        let rt = Runtime::new(RuntimeConfig::default());
        let mut msg = Message::sample("x", normal());
        apply_stack(&rt, &mut msg).unwrap();
        assert!(msg.done);
        assert_eq!(msg.value.as_ref().map(|v| v.rank()), Some(0));
    }

    #[test]
    fn test_debug_runtime_resolves() {
        let rt = Runtime::new(RuntimeConfig {
            debug: true,
            ..RuntimeConfig::default()
        });
        let log = Log::default();
        let _scope = rt.enter(recorder("inner", &log, false));
        let mut msg = Message::observe("x", normal(), Tensor::scalar(0.1));
        apply_stack(&rt, &mut msg).unwrap();
        assert_eq!(msg.value, Some(Tensor::scalar(0.1)));
        assert_eq!(*log.lock(), vec!["pre:inner", "post:inner"]);
    }

    #[test]
    fn test_hook_order() {
        let rt = Runtime::new(RuntimeConfig::default());
        let log = Log::default();
        let _outer = rt.enter(recorder("outer", &log, false));
        let _inner = rt.enter(recorder("inner", &log, false));

        let mut msg = Message::sample("x", normal());
        apply_stack(&rt, &mut msg).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["pre:inner", "pre:outer", "post:outer", "post:inner"]
        );
    }

    #[test]
    fn test_stop_hides_site_from_outer() {
        let rt = Runtime::new(RuntimeConfig::default());
        let log = Log::default();
        let _outer = rt.enter(recorder("outer", &log, false));
        let _inner = rt.enter(recorder("inner", &log, true));

        let mut msg = Message::sample("x", normal());
        apply_stack(&rt, &mut msg).unwrap();

        assert_eq!(*log.lock(), vec!["pre:inner", "post:inner"]);
        assert!(msg.value.is_some());
    }

    #[test]
    fn test_observed_value_is_kept() {
        let rt = Runtime::new(RuntimeConfig::default());
        let mut msg = Message::observe("x", normal(), Tensor::scalar(3.5));
        apply_stack(&rt, &mut msg).unwrap();
        assert_eq!(msg.value, Some(Tensor::scalar(3.5)));
    }

    #[test]
    fn test_observed_without_value_fails() {
        let rt = Runtime::new(RuntimeConfig::default());
        let mut msg = Message::sample("x", normal());
        msg.is_observed = true;
        let err = apply_stack(&rt, &mut msg).unwrap_err();
        assert!(matches!(err, RuntimeError::MissingObservedValue(name) if name == "x"));
    }

    #[test]
    fn test_shape_validation() {
        #[derive(Debug)]
        struct Vector3;
        impl Distribution for Vector3 {
            fn name(&self) -> &'static str {
                "Vector3"
            }
            fn sample(&self, _rng: &mut dyn rand::RngCore) -> Tensor {
                Tensor::zeros(vec![3])
            }
            fn log_prob(&self, _value: &Tensor) -> crate::runtime::error::DistributionResult<f64> {
                Ok(0.0)
            }
            fn event_shape(&self) -> &[usize] {
                &[3]
            }
        }

        let rt = Runtime::new(RuntimeConfig::default());
        let mut msg = Message::observe("v", Arc::new(Vector3), Tensor::scalar(1.0));
        let err = apply_stack(&rt, &mut msg).unwrap_err();
        assert!(matches!(err, RuntimeError::ShapeMismatch { .. }));

        let lax = Runtime::new(RuntimeConfig {
            validate_shapes: false,
            ..RuntimeConfig::default()
        });
        let mut msg = Message::observe("v", Arc::new(Vector3), Tensor::scalar(1.0));
        apply_stack(&lax, &mut msg).unwrap();
    }

    #[test]
    fn test_continuation_runs_once() {
        let rt = Runtime::new(RuntimeConfig::default());
        let count = Arc::new(Mutex::new(0));
        let seen = count.clone();

        let mut msg = Message::sample("x", normal());
        msg.continuation = Some(Arc::new(move |_rt: &Runtime, m: &mut Message| -> Result<()> {
            assert!(m.done);
            *seen.lock() += 1;
            Ok(())
        }));
        apply_stack(&rt, &mut msg).unwrap();

        assert_eq!(*count.lock(), 1);
        assert!(msg.continuation.is_none());
    }
}
