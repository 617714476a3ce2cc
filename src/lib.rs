//! Poutine – composable effect handlers for probabilistic programs
//!
//! This crate implements a messenger stack for stochastic functions with:
//! - Explicit runtime context owning the stack, RNG, and parameter store
//! - A two-phase stack applier with `stop`/`done` short-circuiting
//! - Scope-guarded messengers that are always popped, even on error
//! - The `do` operator, splitting intervened sites into factual and
//!   counterfactual copies
//! - Trace, condition, block, and replay handlers

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Effect handlers built on the messenger stack
pub mod handlers;

/// Runtime core: messages, messengers, the stack applier
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{Runtime, RuntimeConfig};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
