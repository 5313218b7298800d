use std::collections::BTreeMap;

use labdrivers_protocol::Idn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A numeric setting that can be read back and written, e.g. a channel's
/// output voltage. Used by the ramp helpers.
pub trait NumericParameter {
    fn name(&self) -> String;

    fn get(&mut self) -> crate::Result<f64>;

    fn set(&mut self, value: f64) -> crate::Result<()>;
}

/// Last known value of each parameter of one instrument or channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterCache {
    values: BTreeMap<String, Value>,
}

impl ParameterCache {
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    /// Forget a value that is no longer known, e.g. after a mode change.
    pub fn invalidate(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

/// Tree of last known parameter values of an instrument and its channels.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub idn: Option<Idn>,
    pub parameters: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub submodules: BTreeMap<String, Snapshot>,
}

impl Snapshot {
    pub fn new(name: &str, cache: &ParameterCache) -> Self {
        Self {
            name: name.to_string(),
            idn: None,
            parameters: cache.values().clone(),
            submodules: BTreeMap::new(),
        }
    }

    pub fn with_idn(mut self, idn: Option<Idn>) -> Self {
        self.idn = idn;
        self
    }

    pub fn add_submodule(&mut self, snapshot: Snapshot) {
        self.submodules.insert(snapshot.name.clone(), snapshot);
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
