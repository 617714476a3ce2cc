//! Effect handlers
//!
//! Each handler is a `Messenger` plus a wrapping function that turns a
//! stochastic function into one running with that messenger installed.
//! Models are plain closures `Fn(&Runtime, A) -> Result<T>`, so handlers
//! compose by nesting:
//!
//! ```ignore
//! let model = |rt: &Runtime, ()| rt.sample("z", Normal::new(0.0, 1.0)?);
//! let traced = handlers::trace(handlers::intervene(model, data));
//! let (z, trace) = traced.run(&rt, ())?;
//! ```

use std::sync::Arc;

use crate::runtime::Runtime;
use crate::runtime::error::Result;
use crate::runtime::messenger::MessengerRef;
use crate::runtime::tensor::Tensor;
use crate::runtime::trace::Trace;

pub mod block;
pub mod condition;
pub mod intervene;
pub mod replay;
pub mod trace;

pub use block::BlockMessenger;
pub use condition::ConditionMessenger;
pub use intervene::{InterventionMap, InterventionMessenger, InterventionValue};
pub use replay::ReplayMessenger;
pub use trace::TraceMessenger;

/// Wrap `model` so every call runs with `messenger` installed
pub fn with_messenger<A, T, F>(
    model: F,
    messenger: MessengerRef,
) -> impl Fn(&Runtime, A) -> Result<T>
where
    F: Fn(&Runtime, A) -> Result<T>,
{
    move |rt: &Runtime, args: A| rt.scoped(messenger.clone(), || model(rt, args))
}

/// Apply interventions to `model`
///
/// One messenger instance is shared by every call of the returned function.
pub fn intervene<A, T, F>(model: F, data: InterventionMap) -> impl Fn(&Runtime, A) -> Result<T>
where
    F: Fn(&Runtime, A) -> Result<T>,
{
    with_messenger(model, Arc::new(InterventionMessenger::from_map(data)))
}

/// Condition `model` on observed values
pub fn condition<A, T, F, I, K>(model: F, data: I) -> impl Fn(&Runtime, A) -> Result<T>
where
    F: Fn(&Runtime, A) -> Result<T>,
    I: IntoIterator<Item = (K, Tensor)>,
    K: Into<String>,
{
    with_messenger(model, Arc::new(ConditionMessenger::new(data)))
}

/// Hide sites of `model` from outer messengers
pub fn block<A, T, F>(model: F, messenger: BlockMessenger) -> impl Fn(&Runtime, A) -> Result<T>
where
    F: Fn(&Runtime, A) -> Result<T>,
{
    with_messenger(model, Arc::new(messenger))
}

/// Resolve latent sites of `model` from `trace`
pub fn replay<A, T, F>(model: F, trace: Trace) -> impl Fn(&Runtime, A) -> Result<T>
where
    F: Fn(&Runtime, A) -> Result<T>,
{
    with_messenger(model, Arc::new(ReplayMessenger::new(trace)))
}

/// Record the sites of `model`
pub fn trace<F>(model: F) -> TraceHandler<F> {
    TraceHandler {
        model,
        messenger: Arc::new(TraceMessenger::new()),
    }
}

/// A model paired with a trace recorder
pub struct TraceHandler<F> {
    model: F,
    messenger: Arc<TraceMessenger>,
}

impl<F> TraceHandler<F> {
    /// Run the model and return its result with the recorded trace
    pub fn run<A, T>(&self, rt: &Runtime, args: A) -> Result<(T, Trace)>
    where
        F: Fn(&Runtime, A) -> Result<T>,
    {
        let value = rt.scoped(self.messenger.clone(), || (self.model)(rt, args))?;
        Ok((value, self.messenger.take_trace()))
    }

    /// Run the model and return only the recorded trace
    pub fn get_trace<A, T>(&self, rt: &Runtime, args: A) -> Result<Trace>
    where
        F: Fn(&Runtime, A) -> Result<T>,
    {
        self.run(rt, args).map(|(_, trace)| trace)
    }
}
