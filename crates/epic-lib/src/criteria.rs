use crate::record::EpochRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type Extractor = Arc<dyn Fn(&EpochRecord) -> Option<Value> + Send + Sync>;

/// How one tree level partitions records.
#[derive(Clone)]
pub enum SplitCriterion {
    /// Dotted attribute path, e.g. `cellInfo.type`.
    KeyPath(String),
    /// Named extraction function; `None` means the value did not resolve.
    Function { name: String, extract: Extractor },
}

impl SplitCriterion {
    pub fn key_path(path: impl Into<String>) -> Self {
        SplitCriterion::KeyPath(path.into())
    }

    pub fn function<F>(name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&EpochRecord) -> Option<Value> + Send + Sync + 'static,
    {
        SplitCriterion::Function {
            name: name.into(),
            extract: Arc::new(extract),
        }
    }

    /// The split key recorded on nodes produced by this criterion.
    pub fn name(&self) -> &str {
        match self {
            SplitCriterion::KeyPath(path) => path,
            SplitCriterion::Function { name, .. } => name,
        }
    }

    pub fn evaluate(&self, record: &EpochRecord) -> Option<Value> {
        match self {
            SplitCriterion::KeyPath(path) => record.attribute(path).cloned(),
            SplitCriterion::Function { extract, .. } => extract(record).filter(|v| !v.is_null()),
        }
    }
}

impl fmt::Debug for SplitCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitCriterion::KeyPath(path) => f.debug_tuple("KeyPath").field(path).finish(),
            SplitCriterion::Function { name, .. } => {
                f.debug_struct("Function").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl From<&str> for SplitCriterion {
    fn from(path: &str) -> Self {
        SplitCriterion::key_path(path)
    }
}

impl From<String> for SplitCriterion {
    fn from(path: String) -> Self {
        SplitCriterion::KeyPath(path)
    }
}

/// The value shared by every record grouped under a node.
///
/// Equality is by value: numbers compare as `f64`, so `1` and `1.0` land
/// in the same group.
#[derive(Debug, Clone)]
pub enum SplitValue {
    Value(Value),
    /// Sentinel for records whose criterion did not resolve.
    Undefined,
}

pub const UNDEFINED_LABEL: &str = "<undefined>";

impl PartialEq for SplitValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SplitValue::Value(a), SplitValue::Value(b)) => values_equal(a, b),
            (SplitValue::Undefined, SplitValue::Undefined) => true,
            _ => false,
        }
    }
}

/// JSON equality with every number read as a double.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).map_or(false, |y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

impl SplitValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            SplitValue::Value(value) => Some(value),
            SplitValue::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, SplitValue::Undefined)
    }

    /// Parse user input: the undefined label, then JSON, then a bare string.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed == UNDEFINED_LABEL {
            return SplitValue::Undefined;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) if !value.is_null() => SplitValue::Value(value),
            _ => SplitValue::Value(Value::String(trimmed.to_string())),
        }
    }
}

impl fmt::Display for SplitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitValue::Value(Value::String(s)) => f.write_str(s),
            SplitValue::Value(other) => write!(f, "{}", other),
            SplitValue::Undefined => f.write_str(UNDEFINED_LABEL),
        }
    }
}

impl From<Value> for SplitValue {
    fn from(value: Value) -> Self {
        if value.is_null() {
            SplitValue::Undefined
        } else {
            SplitValue::Value(value)
        }
    }
}

impl From<&str> for SplitValue {
    fn from(value: &str) -> Self {
        SplitValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for SplitValue {
    fn from(value: String) -> Self {
        SplitValue::Value(Value::String(value))
    }
}

impl From<i64> for SplitValue {
    fn from(value: i64) -> Self {
        SplitValue::Value(Value::from(value))
    }
}

impl From<f64> for SplitValue {
    fn from(value: f64) -> Self {
        SplitValue::from(Value::from(value))
    }
}

impl From<bool> for SplitValue {
    fn from(value: bool) -> Self {
        SplitValue::Value(Value::Bool(value))
    }
}

/// What the builder does with a record whose criterion does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Group the record under [`SplitValue::Undefined`].
    #[default]
    Sentinel,
    /// Abort the build with `TreeError::UnresolvedCriterion`.
    Fail,
}
