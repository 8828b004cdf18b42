use serde_json::{Map, Value};

/// Raw key/value parameters of an API request.
///
/// A key holding JSON `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a JSON object (or `null`, meaning no parameters).
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Like `get`, but blank strings and empty arrays also count as absent.
    pub fn filled(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|value| match value {
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(coerce_integer)
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(coerce_boolean)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integer array; `None` if absent or any element is not an integer.
    pub fn integers(&self, key: &str) -> Option<Vec<i64>> {
        self.get(key)?
            .as_array()?
            .iter()
            .map(coerce_integer)
            .collect()
    }

    /// A copy without the given keys.
    pub fn except<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = self.0.clone();
        for key in keys {
            map.remove(key);
        }
        Self(map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// JSON integers and integer-looking strings.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `true`, `false`, `0`, `1` and their string forms.
pub fn coerce_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "0" | "false" => Some(false),
            "1" | "true" => Some(true),
            _ => None,
        },
        _ => None,
    }
}
