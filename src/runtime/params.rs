//! Parameter store
//!
//! Named tensors that persist across model executions on one runtime.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::tensor::Tensor;

/// Named parameter values
#[derive(Debug, Default)]
pub struct ParamStore {
    values: RwLock<BTreeMap<String, Tensor>>,
}

impl ParamStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value for `name`, initialising it with `init` when absent
    pub fn get_or_init(&self, name: &str, init: impl FnOnce() -> Tensor) -> Tensor {
        if let Some(value) = self.values.read().get(name) {
            return value.clone();
        }
        self.values
            .write()
            .entry(name.to_string())
            .or_insert_with(init)
            .clone()
    }

    /// Current value of a parameter
    pub fn get(&self, name: &str) -> Option<Tensor> {
        self.values.read().get(name).cloned()
    }

    /// Overwrite a parameter
    pub fn set(&self, name: impl Into<String>, value: Tensor) {
        self.values.write().insert(name.into(), value);
    }

    /// Names of all stored parameters
    pub fn names(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Remove every parameter
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_only_once() {
        let store = ParamStore::new();
        let first = store.get_or_init("w", || Tensor::scalar(1.0));
        let second = store.get_or_init("w", || Tensor::scalar(5.0));
        assert_eq!(first, second);
        assert_eq!(store.names(), vec!["w".to_string()]);
    }

    #[test]
    fn test_set_overrides() {
        let store = ParamStore::new();
        store.set("w", Tensor::scalar(2.0));
        assert_eq!(store.get_or_init("w", || Tensor::scalar(0.0)), Tensor::scalar(2.0));
        store.clear();
        assert!(store.get("w").is_none());
    }
}
