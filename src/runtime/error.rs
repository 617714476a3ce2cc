//! Error and warning types for the messenger runtime
//!
//! Domain errors use thiserror. Failures raised by user models are carried
//! through unchanged as `anyhow::Error`.

use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

use super::messenger::MessengerId;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Intervention value is not one of none, distribution, number, tensor
    #[error("Interventions of type '{type_name}' are not supported")]
    UnsupportedInterventionType {
        /// Name of the offending value's type
        type_name: String,
    },

    /// Observed site reached the primitive without a value
    #[error("Observed site '{0}' has no value")]
    MissingObservedValue(String),

    /// Stack traversal finished without a value for the site
    #[error("Site '{0}' was not resolved to a value")]
    UnresolvedSite(String),

    /// Value shape does not end with the distribution's event shape
    #[error("Site '{site}': value shape {value_shape:?} does not match event shape {event_shape:?}")]
    ShapeMismatch {
        /// Site name
        site: String,
        /// Shape of the supplied value
        value_shape: Vec<usize>,
        /// Event shape of the site's distribution
        event_shape: Vec<usize>,
    },

    /// Distribution construction or evaluation errors
    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    /// Tensor construction errors
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure raised by a user model
    #[error("Model error: {0}")]
    Model(#[from] anyhow::Error),
}

/// Distribution-specific errors
#[derive(Debug, Error, PartialEq)]
pub enum DistributionError {
    /// Scale parameter must be strictly positive and finite
    #[error("Invalid scale {0}: must be positive and finite")]
    InvalidScale(f64),

    /// Probability outside [0, 1]
    #[error("Invalid probability {0}: must lie in [0, 1]")]
    InvalidProbability(f64),

    /// Parameters with incompatible shapes
    #[error("Parameter shapes {left:?} and {right:?} differ")]
    ParameterShape {
        /// Shape of the first parameter
        left: Vec<usize>,
        /// Shape of the second parameter
        right: Vec<usize>,
    },

    /// Point mass asked for more event dimensions than its value has
    #[error("event_dim {event_dim} exceeds value rank {rank}")]
    EventDim {
        /// Requested event dimensionality
        event_dim: usize,
        /// Rank of the value
        rank: usize,
    },

    /// Value passed to log_prob has the wrong shape
    #[error("Value shape {value:?} incompatible with {expected:?}")]
    ValueShape {
        /// Shape of the value
        value: Vec<usize>,
        /// Expected shape
        expected: Vec<usize>,
    },
}

/// Tensor-specific errors
#[derive(Debug, Error, PartialEq)]
pub enum TensorError {
    /// Element count does not match the product of the shape
    #[error("Shape {shape:?} needs {expected} elements, got {actual}")]
    ElementCount {
        /// Requested shape
        shape: Vec<usize>,
        /// Elements required by the shape
        expected: usize,
        /// Elements supplied
        actual: usize,
    },

    /// Nested input is not rectangular
    #[error("Ragged nested data at depth {0}")]
    Ragged(usize),
}

/// Convenience result alias for distribution operations
pub type DistributionResult<T> = std::result::Result<T, DistributionError>;

/// Convenience result alias for tensor operations
pub type TensorResult<T> = std::result::Result<T, TensorError>;

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Non-fatal conditions recorded while running a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuntimeWarning {
    /// A second intervention instance rewrote a site another one already owns
    DuplicateIntervention {
        /// Site name at the time of the second intervention
        site: String,
        /// Instance that stamped the site first
        previous: MessengerId,
        /// Instance that is overriding it
        current: MessengerId,
    },
}

impl fmt::Display for RuntimeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeWarning::DuplicateIntervention { site, .. } => write!(
                f,
                "Attempting to intervene on variable {} multiple times, \
                 this is almost certainly incorrect behavior",
                site
            ),
        }
    }
}
