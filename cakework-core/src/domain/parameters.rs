//! Run parameters
//!
//! Generic insertion-ordered key/value bag for tasks whose parameter schema
//! is not known ahead of time. Known tasks use typed requests instead
//! (see [`crate::task`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters supplied at submission time, sent as a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

/// Error building parameters from untyped input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParametersError {
    #[error("parameters must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid parameter assignment '{0}', expected key=value")]
    InvalidAssignment(String),

    #[error("failed to serialize parameters: {0}")]
    Serialization(String),
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value, returning the previous one for that key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Builds parameters from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, ParametersError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(ParametersError::NotAnObject("null")),
            Value::Bool(_) => Err(ParametersError::NotAnObject("a boolean")),
            Value::Number(_) => Err(ParametersError::NotAnObject("a number")),
            Value::String(_) => Err(ParametersError::NotAnObject("a string")),
            Value::Array(_) => Err(ParametersError::NotAnObject("an array")),
        }
    }

    /// Serializes any value into parameters
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ParametersError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ParametersError::Serialization(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parses a `key=value` assignment
    ///
    /// The value is read as JSON when it parses as JSON (`age=34`,
    /// `tags=["a"]`), otherwise it is taken as a plain string.
    pub fn parse_assignment(input: &str) -> Result<(String, Value), ParametersError> {
        let (key, raw) = input
            .split_once('=')
            .ok_or_else(|| ParametersError::InvalidAssignment(input.to_string()))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ParametersError::InvalidAssignment(input.to_string()));
        }

        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        Ok((key.to_string(), value))
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
