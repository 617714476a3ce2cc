//! Probability distributions
//!
//! The `Distribution` trait is the capability every site carries. `Delta`
//! is the degenerate point mass used for hard substitutions.

use rand::RngCore;
use rand::distributions::{Bernoulli as BernoulliSampler, Distribution as _, Open01};
use std::fmt;
use std::sync::Arc;

use super::error::{DistributionError, DistributionResult};
use super::tensor::Tensor;

/// Shared handle to a distribution
pub type DistributionRef = Arc<dyn Distribution>;

/// A distribution that can be sampled and scored
///
/// Values have shape `batch_shape ++ event_shape`.
pub trait Distribution: Send + Sync + fmt::Debug {
    /// Short name for logs and trace summaries
    fn name(&self) -> &'static str;

    /// Draw a value
    fn sample(&self, rng: &mut dyn RngCore) -> Tensor;

    /// Log density (or mass) of `value`, summed over all elements
    fn log_prob(&self, value: &Tensor) -> DistributionResult<f64>;

    /// Shape of a single event
    fn event_shape(&self) -> &[usize];

    /// Shape of independent batch members
    fn batch_shape(&self) -> &[usize] {
        &[]
    }
}

/// Normal distribution, optionally batched over matching `loc`/`scale` shapes
#[derive(Debug, Clone)]
pub struct Normal {
    loc: Tensor,
    scale: Tensor,
}

impl Normal {
    /// Scalar normal
    pub fn new(loc: f64, scale: f64) -> DistributionResult<Self> {
        Self::batched(Tensor::scalar(loc), Tensor::scalar(scale))
    }

    /// Element-wise independent normals
    pub fn batched(loc: Tensor, scale: Tensor) -> DistributionResult<Self> {
        if loc.shape() != scale.shape() {
            return Err(DistributionError::ParameterShape {
                left: loc.shape().to_vec(),
                right: scale.shape().to_vec(),
            });
        }
        if let Some(&bad) = scale.data().iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(DistributionError::InvalidScale(bad));
        }
        Ok(Self { loc, scale })
    }

    /// Location parameter
    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    /// Scale parameter
    pub fn scale(&self) -> &Tensor {
        &self.scale
    }
}

impl Distribution for Normal {
    fn name(&self) -> &'static str {
        "Normal"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Tensor {
        let data = self
            .loc
            .data()
            .iter()
            .zip(self.scale.data())
            .map(|(m, s)| m + s * standard_normal(&mut *rng))
            .collect();
        Tensor::from_parts(data, self.loc.shape().to_vec())
    }

    fn log_prob(&self, value: &Tensor) -> DistributionResult<f64> {
        if value.shape() != self.loc.shape() {
            return Err(DistributionError::ValueShape {
                value: value.shape().to_vec(),
                expected: self.loc.shape().to_vec(),
            });
        }
        let half_log_two_pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
        Ok(value
            .data()
            .iter()
            .zip(self.loc.data().iter().zip(self.scale.data()))
            .map(|(x, (m, s))| {
                let z = (x - m) / s;
                -0.5 * z * z - s.ln() - half_log_two_pi
            })
            .sum())
    }

    fn event_shape(&self) -> &[usize] {
        &[]
    }

    fn batch_shape(&self) -> &[usize] {
        self.loc.shape()
    }
}

// Box-Muller transform.
fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    let u1: f64 = Open01.sample(&mut *rng);
    let u2: f64 = Open01.sample(&mut *rng);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Bernoulli distribution over {0, 1}
#[derive(Debug, Clone)]
pub struct Bernoulli {
    probs: f64,
    sampler: BernoulliSampler,
}

impl Bernoulli {
    /// Bernoulli with success probability `probs`
    pub fn new(probs: f64) -> DistributionResult<Self> {
        let sampler =
            BernoulliSampler::new(probs).map_err(|_| DistributionError::InvalidProbability(probs))?;
        Ok(Self { probs, sampler })
    }

    /// Success probability
    pub fn probs(&self) -> f64 {
        self.probs
    }
}

impl Distribution for Bernoulli {
    fn name(&self) -> &'static str {
        "Bernoulli"
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Tensor {
        let hit = self.sampler.sample(&mut *rng);
        Tensor::scalar(if hit { 1.0 } else { 0.0 })
    }

    fn log_prob(&self, value: &Tensor) -> DistributionResult<f64> {
        Ok(value
            .data()
            .iter()
            .map(|&x| {
                if x == 1.0 {
                    self.probs.ln()
                } else if x == 0.0 {
                    (1.0 - self.probs).ln()
                } else {
                    f64::NEG_INFINITY
                }
            })
            .sum())
    }

    fn event_shape(&self) -> &[usize] {
        &[]
    }
}

/// Point mass at a fixed value
///
/// The trailing `event_dim` dimensions of `value` form the event; the rest
/// are batch dimensions.
#[derive(Debug, Clone)]
pub struct Delta {
    value: Tensor,
    event_dim: usize,
}

impl Delta {
    /// Point mass at `value` with `event_dim` event dimensions
    pub fn new(value: Tensor, event_dim: usize) -> DistributionResult<Self> {
        if event_dim > value.rank() {
            return Err(DistributionError::EventDim {
                event_dim,
                rank: value.rank(),
            });
        }
        Ok(Self { value, event_dim })
    }

    /// The supported value
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    /// Number of event dimensions
    pub fn event_dim(&self) -> usize {
        self.event_dim
    }
}

impl Distribution for Delta {
    fn name(&self) -> &'static str {
        "Delta"
    }

    fn sample(&self, _rng: &mut dyn RngCore) -> Tensor {
        self.value.clone()
    }

    fn log_prob(&self, value: &Tensor) -> DistributionResult<f64> {
        match value.eq_elementwise(&self.value) {
            Some(eq) if eq.iter().all(|e| *e) => Ok(0.0),
            Some(_) => Ok(f64::NEG_INFINITY),
            None => Err(DistributionError::ValueShape {
                value: value.shape().to_vec(),
                expected: self.value.shape().to_vec(),
            }),
        }
    }

    fn event_shape(&self) -> &[usize] {
        let shape = self.value.shape();
        &shape[shape.len() - self.event_dim..]
    }

    fn batch_shape(&self) -> &[usize] {
        let shape = self.value.shape();
        &shape[..shape.len() - self.event_dim]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_normal_rejects_bad_scale() {
        assert_eq!(
            Normal::new(0.0, 0.0).unwrap_err(),
            DistributionError::InvalidScale(0.0)
        );
        assert!(Normal::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_normal_log_prob_at_mean() {
        let normal = Normal::new(1.0, 2.0).unwrap();
        let lp = normal.log_prob(&Tensor::scalar(1.0)).unwrap();
        let expected = -(2.0f64).ln() - 0.5 * (2.0 * std::f64::consts::PI).ln();
        assert!((lp - expected).abs() < 1e-12);
    }

    #[test]
    fn test_normal_batched_sample_shape() {
        let normal = Normal::batched(
            Tensor::vector(vec![0.0, 10.0, 20.0]),
            Tensor::vector(vec![1.0, 1.0, 1.0]),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let x = normal.sample(&mut rng);
        assert_eq!(x.shape(), &[3]);
        assert_eq!(normal.batch_shape(), &[3]);
        assert!(normal.event_shape().is_empty());
        assert_eq!(normal.loc().data(), &[0.0, 10.0, 20.0]);
        assert_eq!(normal.scale().shape(), &[3]);
    }

    #[test]
    fn test_bernoulli_support() {
        let b = Bernoulli::new(0.25).unwrap();
        assert_eq!(b.probs(), 0.25);
        assert!((b.log_prob(&Tensor::scalar(1.0)).unwrap() - 0.25f64.ln()).abs() < 1e-12);
        assert_eq!(b.log_prob(&Tensor::scalar(0.5)).unwrap(), f64::NEG_INFINITY);
        assert!(Bernoulli::new(1.5).is_err());
    }

    #[test]
    fn test_delta_event_shape() {
        let value = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
        let delta = Delta::new(value.clone(), 1).unwrap();
        assert_eq!(delta.event_shape(), &[3]);
        assert_eq!(delta.batch_shape(), &[2]);
        assert_eq!(delta.event_dim(), 1);
        assert_eq!(delta.value(), &value);
        assert_eq!(delta.log_prob(&value).unwrap(), 0.0);
        assert_eq!(
            delta.log_prob(&value.map(|x| x + 1.0)).unwrap(),
            f64::NEG_INFINITY
        );

        let err = Delta::new(Tensor::scalar(1.0), 1).unwrap_err();
        assert_eq!(err, DistributionError::EventDim { event_dim: 1, rank: 0 });
    }
}
