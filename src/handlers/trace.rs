//! Trace recording

use parking_lot::Mutex;

use crate::runtime::Runtime;
use crate::runtime::error::Result;
use crate::runtime::message::Message;
use crate::runtime::messenger::Messenger;
use crate::runtime::trace::{Site, Trace};

/// Records every resolved site that reaches it
///
/// Sites are captured in the post-hook, once their value is final. The trace
/// is reset each time the messenger is installed.
#[derive(Default)]
pub struct TraceMessenger {
    trace: Mutex<Trace>,
}

impl TraceMessenger {
    /// Create a messenger with an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the trace recorded so far
    pub fn trace(&self) -> Trace {
        self.trace.lock().clone()
    }

    /// Take the recorded trace, leaving an empty one behind
    pub fn take_trace(&self) -> Trace {
        std::mem::take(&mut *self.trace.lock())
    }
}

impl Messenger for TraceMessenger {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn post_hook(&self, _rt: &Runtime, msg: &mut Message) -> Result<()> {
        if let Some(site) = Site::from_message(msg) {
            self.trace.lock().insert(site);
        }
        Ok(())
    }

    fn on_enter(&self, _rt: &Runtime) {
        *self.trace.lock() = Trace::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::distribution::Normal;
    use crate::runtime::tensor::Tensor;
    use std::sync::Arc;

    #[test]
    fn test_records_all_kinds() {
        let rt = Runtime::seeded(1);
        let messenger = Arc::new(TraceMessenger::new());
        rt.scoped(messenger.clone(), || {
            rt.param("w", Tensor::scalar(0.5))?;
            rt.sample("z", Normal::new(0.0, 1.0)?)?;
            rt.observe("x", Normal::new(0.0, 1.0)?, Tensor::scalar(0.3))?;
            Ok(())
        })
        .unwrap();

        let trace = messenger.take_trace();
        assert_eq!(trace.names(), vec!["w", "z", "x"]);
        assert!(trace.get("x").unwrap().is_observed);
        assert!(messenger.trace().is_empty());
    }
}
