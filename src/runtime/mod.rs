//! Runtime context and public API
//!
//! `Runtime` is the explicit context every model runs against. It owns the
//! messenger stack, the random number generator, the parameter store, and
//! the warning log. Primitive calls (`sample`, `observe`, `param`) build a
//! fresh message and hand it to the stack applier.

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

// Submodules
pub mod distribution;
pub mod error;
pub mod message;
pub mod messenger;
pub mod params;
pub mod stack;
pub mod tensor;
pub mod trace;

use distribution::{Delta, Distribution, DistributionRef};
use error::Result;
use message::Message;
use messenger::{MessengerRef, MessengerScope};
use params::ParamStore;
use stack::MessengerStack;
use tensor::Tensor;

/// Configuration for a runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// RNG seed; `None` seeds from OS entropy
    pub seed: Option<u64>,

    /// Reject values whose trailing dimensions differ from the event shape
    pub validate_shapes: bool,

    /// Log runtime creation and every resolved site at debug level
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed: None,
            validate_shapes: true,
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config = serde_json::from_slice(&data)
            .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write this configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Execution context for stochastic functions
pub struct Runtime {
    config: RuntimeConfig,
    stack: MessengerStack,
    rng: Mutex<StdRng>,
    params: ParamStore,
    warnings: Mutex<Vec<RuntimeWarning>>,
}

impl Runtime {
    /// Create a runtime with the given configuration
    pub fn new(config: RuntimeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        if config.debug {
            tracing::debug!(?config, "runtime created");
        }
        Self {
            config,
            stack: MessengerStack::new(),
            rng: Mutex::new(rng),
            params: ParamStore::new(),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Runtime with a fixed seed and default settings
    pub fn seeded(seed: u64) -> Self {
        Self::new(RuntimeConfig {
            seed: Some(seed),
            ..RuntimeConfig::default()
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the messenger stack
    pub fn stack(&self) -> &MessengerStack {
        &self.stack
    }

    /// Get the parameter store
    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Reseed the random number generator
    pub fn set_seed(&self, seed: u64) {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
    }

    /// Draw from a distribution with the runtime's RNG
    pub fn draw(&self, distribution: &DistributionRef) -> Tensor {
        let mut rng = self.rng.lock();
        distribution.sample(&mut *rng)
    }

    /// Install a messenger until the returned guard is dropped
    pub fn enter(&self, messenger: MessengerRef) -> MessengerScope<'_> {
        MessengerScope::new(self, messenger)
    }

    /// Run `body` with `messenger` installed
    pub fn scoped<T>(
        &self,
        messenger: MessengerRef,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let _scope = self.enter(messenger);
        body()
    }

    /// Run a message through the messenger stack
    pub fn apply_stack(&self, msg: &mut Message) -> Result<()> {
        stack::apply_stack(self, msg)
    }

    /// Latent sample site
    pub fn sample<D>(&self, name: impl Into<String>, distribution: D) -> Result<Tensor>
    where
        D: Distribution + 'static,
    {
        self.sample_shared(name, Arc::new(distribution))
    }

    /// Latent sample site with a shared distribution handle
    pub fn sample_shared(
        &self,
        name: impl Into<String>,
        distribution: DistributionRef,
    ) -> Result<Tensor> {
        let mut msg = Message::sample(name, distribution);
        self.resolve(&mut msg)
    }

    /// Observed site scored against `value`
    pub fn observe<D>(
        &self,
        name: impl Into<String>,
        distribution: D,
        value: Tensor,
    ) -> Result<Tensor>
    where
        D: Distribution + 'static,
    {
        let mut msg = Message::observe(name, Arc::new(distribution), value);
        self.resolve(&mut msg)
    }

    /// Parameter site; `init` is stored on first use
    pub fn param(&self, name: impl Into<String>, init: Tensor) -> Result<Tensor> {
        let event_dim = init.rank();
        let mut msg = Message::param(name, Arc::new(Delta::new(init, event_dim)?));
        self.resolve(&mut msg)
    }

    fn resolve(&self, msg: &mut Message) -> Result<Tensor> {
        self.apply_stack(msg)?;
        msg.value
            .clone()
            .ok_or_else(|| RuntimeError::UnresolvedSite(msg.name.clone()))
    }

    /// Record a non-fatal warning
    pub fn warn(&self, warning: RuntimeWarning) {
        tracing::warn!(warning = ?warning, "{}", warning);
        self.warnings.lock().push(warning);
    }

    /// Warnings recorded so far
    pub fn warnings(&self) -> Vec<RuntimeWarning> {
        self.warnings.lock().clone()
    }

    /// Drain recorded warnings
    pub fn take_warnings(&self) -> Vec<RuntimeWarning> {
        std::mem::take(&mut *self.warnings.lock())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

// Re-export commonly used types
pub use distribution::{Bernoulli, Normal};
pub use error::{RuntimeError, RuntimeWarning};
pub use messenger::{Messenger, MessengerId};
pub use trace::{Site, Trace};
