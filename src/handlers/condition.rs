//! Conditioning on data

use std::collections::BTreeMap;

use crate::runtime::Runtime;
use crate::runtime::error::Result;
use crate::runtime::message::Message;
use crate::runtime::messenger::Messenger;
use crate::runtime::tensor::Tensor;

/// Fixes named sample sites to observed values
pub struct ConditionMessenger {
    data: BTreeMap<String, Tensor>,
}

impl ConditionMessenger {
    /// Build from `(name, value)` pairs
    pub fn new<I, K>(data: I) -> Self
    where
        I: IntoIterator<Item = (K, Tensor)>,
        K: Into<String>,
    {
        Self {
            data: data.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Messenger for ConditionMessenger {
    fn name(&self) -> &'static str {
        "condition"
    }

    fn pre_sample(&self, _rt: &Runtime, msg: &mut Message) -> Result<()> {
        if msg.done {
            return Ok(());
        }
        if let Some(value) = self.data.get(&msg.name) {
            msg.value = Some(value.clone());
            msg.is_observed = true;
        }
        Ok(())
    }
}
