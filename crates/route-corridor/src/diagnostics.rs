//! Optional diagnostics for direction matching
//!
//! The angle and direction algorithms take a `&mut dyn DiagnosticSink` and report the intermediate
//! values behind a decision. Production callers pass [`NoopSink`]; debugging callers pass
//! [`DebugValues`] and render it as JSON next to the result.

use crate::Coordinate;
use serde_json::{Map, Number, Value};

/// Key under which per-sample angle information is nested in the JSON output
pub const ANGLE_DIFFERENCE_KEY: &str = "angleDifference";

/// A single diagnostic value
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Coordinate(Coordinate),
}

impl From<bool> for DiagnosticValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for DiagnosticValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for DiagnosticValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for DiagnosticValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DiagnosticValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Coordinate> for DiagnosticValue {
    fn from(value: Coordinate) -> Self {
        Self::Coordinate(value)
    }
}

impl DiagnosticValue {
    fn to_json(&self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(*value),
            Self::Number(value) => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(value.to_string())),
            Self::Text(value) => Value::String(value.clone()),
            Self::Coordinate(value) => Value::String(format!("({},{})", value.x, value.y)),
        }
    }
}

/// Receiver of diagnostic values
pub trait DiagnosticSink {
    /// Record a top-level value; a repeated key overwrites the previous value
    fn record(&mut self, key: &str, value: DiagnosticValue);

    /// Record a per-sample value; repeated keys are kept side by side
    fn record_sample(&mut self, key: &str, value: DiagnosticValue);

    /// Whether recorded values are kept at all
    ///
    /// Callers check this before building values that allocate.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Sink that discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    #[inline(always)]
    fn record(&mut self, _key: &str, _value: DiagnosticValue) {}

    #[inline(always)]
    fn record_sample(&mut self, _key: &str, _value: DiagnosticValue) {}

    #[inline(always)]
    fn is_enabled(&self) -> bool {
        false
    }
}

/// Sink that keeps values in insertion order and renders them as JSON
#[derive(Clone, Debug, Default)]
pub struct DebugValues {
    values: Map<String, Value>,
    samples: Map<String, Value>,
}

impl DebugValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a top-level value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a per-sample value by its (possibly suffixed) key
    pub fn sample(&self, key: &str) -> Option<&Value> {
        self.samples.get(key)
    }

    /// Number of per-sample values recorded
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Render all values as a JSON object, samples nested under `"angleDifference"`
    pub fn to_json(&self) -> String {
        let mut object = self.values.clone();
        if !self.samples.is_empty() {
            object.insert(
                ANGLE_DIFFERENCE_KEY.to_string(),
                Value::Object(self.samples.clone()),
            );
        }
        Value::Object(object).to_string()
    }

    /// `key`, or `key_1`, `key_2`, ... if already taken
    fn unique_sample_key(&self, key: &str) -> String {
        if !self.samples.contains_key(key) {
            return key.to_string();
        }
        (1..)
            .map(|index| format!("{key}_{index}"))
            .find(|candidate| !self.samples.contains_key(candidate))
            .unwrap_or_else(|| key.to_string())
    }
}

impl DiagnosticSink for DebugValues {
    fn record(&mut self, key: &str, value: DiagnosticValue) {
        self.values.insert(key.to_string(), value.to_json());
    }

    fn record_sample(&mut self, key: &str, value: DiagnosticValue) {
        let key = self.unique_sample_key(key);
        self.samples.insert(key, value.to_json());
    }
}
