//! Dense numeric tensors
//!
//! A minimal row-major `f64` array that stands in for the numeric backend.
//! Only what the messenger machinery needs is provided: construction,
//! shape queries, and element-wise comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{TensorError, TensorResult};

/// Row-major array of `f64` values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: Vec<f64>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Zero-dimensional tensor holding a single value
    pub fn scalar(value: f64) -> Self {
        Self {
            data: vec![value],
            shape: Vec::new(),
        }
    }

    /// Build a tensor from flat data and a shape
    pub fn from_vec(data: Vec<f64>, shape: Vec<usize>) -> TensorResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::ElementCount {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    // Callers guarantee `data.len()` matches `shape`.
    pub(crate) fn from_parts(data: Vec<f64>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self { data, shape }
    }

    /// One-dimensional tensor
    pub fn vector(data: Vec<f64>) -> Self {
        let len = data.len();
        Self {
            data,
            shape: vec![len],
        }
    }

    /// Tensor of zeros with the given shape
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            data: vec![0.0; len],
            shape,
        }
    }

    /// Shape of the tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Flat view of the elements
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// The single element, if the tensor has exactly one
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// Apply `f` to every element
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.iter().copied().map(f).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Element-wise equality; `None` when shapes differ
    pub fn eq_elementwise(&self, other: &Tensor) -> Option<Vec<bool>> {
        if self.shape != other.shape {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a == b)
                .collect(),
        )
    }

    /// Same shape and every element within `rtol * |b| + atol`
    pub fn allclose(&self, other: &Tensor, rtol: f64, atol: f64) -> bool {
        self.shape == other.shape
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= atol + rtol * b.abs())
    }

    /// Whether the trailing dimensions equal `suffix`
    pub fn shape_ends_with(&self, suffix: &[usize]) -> bool {
        self.shape.ends_with(suffix)
    }

    /// Parse a JSON number or (nested, rectangular) numeric array
    ///
    /// Returns `Ok(None)` for any other JSON type so callers can report it.
    pub fn from_json(value: &serde_json::Value) -> TensorResult<Option<Self>> {
        match value {
            serde_json::Value::Number(n) => Ok(n.as_f64().map(Tensor::scalar)),
            serde_json::Value::Array(_) => {
                let mut data = Vec::new();
                let mut shape = Vec::new();
                if !collect_json(value, 0, &mut shape, &mut data)? {
                    return Ok(None);
                }
                Tensor::from_vec(data, shape).map(Some)
            }
            _ => Ok(None),
        }
    }
}

// Returns false on a non-numeric leaf.
fn collect_json(
    value: &serde_json::Value,
    depth: usize,
    shape: &mut Vec<usize>,
    data: &mut Vec<f64>,
) -> TensorResult<bool> {
    match value {
        serde_json::Value::Array(items) => {
            match shape.get(depth) {
                Some(&len) if len != items.len() => return Err(TensorError::Ragged(depth)),
                Some(_) => {}
                None if shape.len() == depth && data.is_empty() => shape.push(items.len()),
                None => return Err(TensorError::Ragged(depth)),
            }
            for item in items {
                if !collect_json(item, depth + 1, shape, data)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        serde_json::Value::Number(n) => {
            if shape.len() != depth {
                return Err(TensorError::Ragged(depth));
            }
            match n.as_f64() {
                Some(v) => {
                    data.push(v);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        _ => Ok(false),
    }
}

impl From<f64> for Tensor {
    fn from(value: f64) -> Self {
        Tensor::scalar(value)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item() {
            Some(v) if self.shape.is_empty() => write!(f, "tensor({})", v),
            _ => write!(f, "tensor({:?}, shape={:?})", self.data, self.shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_is_zero_dimensional() {
        let t = Tensor::scalar(2.0);
        assert_eq!(t.rank(), 0);
        assert_eq!(t.numel(), 1);
        assert_eq!(t.item(), Some(2.0));
    }

    #[test]
    fn test_from_vec_checks_element_count() {
        let err = Tensor::from_vec(vec![1.0, 2.0, 3.0], vec![2, 2]).unwrap_err();
        assert_eq!(
            err,
            TensorError::ElementCount {
                shape: vec![2, 2],
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_eq_elementwise_requires_same_shape() {
        let a = Tensor::vector(vec![1.0, 2.0]);
        let b = Tensor::vector(vec![1.0, 3.0]);
        assert_eq!(a.eq_elementwise(&b), Some(vec![true, false]));
        assert_eq!(a.eq_elementwise(&Tensor::scalar(1.0)), None);
    }

    #[test]
    fn test_allclose() {
        let a = Tensor::vector(vec![1.0, 100.0]);
        let b = Tensor::vector(vec![1.0 + 1e-9, 100.001]);
        assert!(a.allclose(&b, 1e-4, 1e-8));
        assert!(!a.allclose(&b, 0.0, 1e-8));
        assert!(!a.allclose(&Tensor::scalar(1.0), 1.0, 1.0));
    }

    #[test]
    fn test_from_json_nested() {
        let t = Tensor::from_json(&json!([[1, 2], [3, 4]])).unwrap().unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0]);

        assert!(Tensor::from_json(&json!("2.0")).unwrap().is_none());
        assert!(Tensor::from_json(&json!([1, "a"])).unwrap().is_none());
        assert_eq!(
            Tensor::from_json(&json!([[1, 2], [3]])).unwrap_err(),
            TensorError::Ragged(1)
        );
    }
}
