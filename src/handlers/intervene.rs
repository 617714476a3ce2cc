//! Interventions (the `do` operator)
//!
//! Given a stochastic function and a mapping from site names to
//! interventions, every matching sample site is split in two:
//!
//! - the factual site keeps its name and is drawn as if nothing happened;
//!   its value does not propagate;
//! - the counterfactual site is renamed `<name>__CF`, carries the
//!   intervention, and its value is what the model sees.
//!
//! Intervening on `z` with `2.0` therefore behaves like replacing
//! `z = sample("z", d)` with `z = sample("z__CF", Delta(2.0))` while still
//! recording a fresh `sample("z", d)`. Composed with `condition`, this
//! represents counterfactual queries over potential outcomes (Single World
//! Intervention Graphs, Richardson & Robins).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::runtime::Runtime;
use crate::runtime::distribution::{Delta, DistributionRef};
use crate::runtime::error::{Result, RuntimeError, RuntimeWarning};
use crate::runtime::message::Message;
use crate::runtime::messenger::{Messenger, MessengerId};
use crate::runtime::tensor::Tensor;

/// Suffix appended to the name of an intervened site
pub const COUNTERFACTUAL_SUFFIX: &str = "__CF";

/// Scratch key listing the intervention instances that already split a site
pub const INTERVENERS_KEY: &str = "interveners";

/// What to substitute at an intervened site
#[derive(Debug, Clone)]
pub enum InterventionValue {
    /// No value supplied: redraw from the site's own distribution with fresh
    /// randomness (posterior predictive)
    Resample,
    /// Draw from a different distribution
    Distribution(DistributionRef),
    /// Fix the site to a number
    Number(f64),
    /// Fix the site to a tensor
    Tensor(Tensor),
}

/// Site name to intervention
pub type InterventionMap = BTreeMap<String, InterventionValue>;

impl From<f64> for InterventionValue {
    fn from(value: f64) -> Self {
        InterventionValue::Number(value)
    }
}

impl From<i64> for InterventionValue {
    fn from(value: i64) -> Self {
        InterventionValue::Number(value as f64)
    }
}

impl From<i32> for InterventionValue {
    fn from(value: i32) -> Self {
        InterventionValue::Number(f64::from(value))
    }
}

impl From<Tensor> for InterventionValue {
    fn from(value: Tensor) -> Self {
        InterventionValue::Tensor(value)
    }
}

impl From<DistributionRef> for InterventionValue {
    fn from(value: DistributionRef) -> Self {
        InterventionValue::Distribution(value)
    }
}

impl<V: Into<InterventionValue>> From<Option<V>> for InterventionValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(InterventionValue::Resample, Into::into)
    }
}

impl TryFrom<&serde_json::Value> for InterventionValue {
    type Error = RuntimeError;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        let unsupported = |type_name: &str| RuntimeError::UnsupportedInterventionType {
            type_name: type_name.to_string(),
        };
        match value {
            Value::Null => Ok(InterventionValue::Resample),
            Value::Number(n) => n
                .as_f64()
                .map(InterventionValue::Number)
                .ok_or_else(|| unsupported("number")),
            Value::Array(_) => Tensor::from_json(value)?
                .map(InterventionValue::Tensor)
                .ok_or_else(|| unsupported("array")),
            Value::Bool(_) => Err(unsupported("bool")),
            Value::String(_) => Err(unsupported("string")),
            Value::Object(_) => Err(unsupported("object")),
        }
    }
}

/// Messenger that rewrites sample sites according to an intervention map
pub struct InterventionMessenger {
    id: MessengerId,
    data: InterventionMap,
}

impl InterventionMessenger {
    /// Build from `(name, intervention)` pairs
    pub fn new<I, K, V>(data: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<InterventionValue>,
    {
        Self::from_map(
            data.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build from a prepared map
    pub fn from_map(data: InterventionMap) -> Self {
        Self {
            id: MessengerId::fresh(),
            data,
        }
    }

    /// Build from a JSON object of site name to null, number, or numeric array
    pub fn from_json(data: &serde_json::Value) -> Result<Self> {
        let object = data.as_object().ok_or_else(|| {
            RuntimeError::Config("intervention data must be a JSON object".to_string())
        })?;
        let mut map = InterventionMap::new();
        for (name, value) in object {
            map.insert(name.clone(), InterventionValue::try_from(value)?);
        }
        Ok(Self::from_map(map))
    }

    /// This instance's identity
    pub fn id(&self) -> MessengerId {
        self.id
    }

    /// The intervention map
    pub fn data(&self) -> &InterventionMap {
        &self.data
    }

    fn already_split(&self, msg: &Message) -> bool {
        msg.scratch
            .get(INTERVENERS_KEY)
            .and_then(|v| v.as_array())
            .is_some_and(|ids| ids.iter().any(|id| id.as_u64() == Some(self.id.as_u64())))
    }

    fn mark_split(&self, msg: &mut Message) {
        let entry = msg
            .scratch
            .entry(INTERVENERS_KEY.to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let Some(ids) = entry.as_array_mut() {
            ids.push(self.id.as_u64().into());
        }
    }
}

// Stochastic intervention: the site is redrawn from `distribution`.
fn substitute_distribution(msg: &mut Message, distribution: DistributionRef) {
    msg.done = false;
    msg.value = None;
    msg.is_observed = false;
    msg.distribution = distribution;
}

// Hard intervention. The site is marked observed so inference code treats
// the point mass as data. The value is checked against the site's own event
// shape, since the substituted point mass always agrees with itself.
fn fix_value(rt: &Runtime, msg: &mut Message, value: Tensor) -> Result<()> {
    let event_shape = msg.distribution.event_shape();
    if rt.config().validate_shapes && !value.shape_ends_with(event_shape) {
        return Err(RuntimeError::ShapeMismatch {
            site: msg.name.clone(),
            value_shape: value.shape().to_vec(),
            event_shape: event_shape.to_vec(),
        });
    }
    let event_dim = event_shape.len();
    let delta = Delta::new(value.clone(), event_dim)?;
    msg.value = Some(value);
    msg.distribution = Arc::new(delta);
    msg.is_observed = true;
    Ok(())
}

impl Messenger for InterventionMessenger {
    fn name(&self) -> &'static str {
        "intervene"
    }

    fn pre_sample(&self, rt: &Runtime, msg: &mut Message) -> Result<()> {
        if msg.intervener_id == Some(self.id) || self.already_split(msg) {
            return Ok(());
        }
        let Some(intervention) = self.data.get(&msg.name) else {
            return Ok(());
        };

        if let Some(previous) = msg.intervener_id {
            rt.warn(RuntimeWarning::DuplicateIntervention {
                site: msg.name.clone(),
                previous,
                current: self.id,
            });
        }

        msg.intervener_id = Some(self.id);
        self.mark_split(msg);

        // Split the node. The copy carries our stamp, so it passes through
        // this messenger untouched.
        let mut factual = msg.clone();
        tracing::debug!(site = %msg.name, intervener = %self.id, "splitting site");
        rt.apply_stack(&mut factual)?;

        msg.name.push_str(COUNTERFACTUAL_SUFFIX);

        match intervention {
            InterventionValue::Resample => {
                let same = msg.distribution.clone();
                substitute_distribution(msg, same);
            }
            InterventionValue::Distribution(d) => substitute_distribution(msg, d.clone()),
            InterventionValue::Number(x) => fix_value(rt, msg, Tensor::scalar(*x))?,
            InterventionValue::Tensor(t) => fix_value(rt, msg, t.clone())?,
        }
        Ok(())
    }
}
