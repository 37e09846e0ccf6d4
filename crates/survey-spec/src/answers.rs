use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Answers captured during a session, keyed by question id.
///
/// Keys keep their insertion order; submission headers follow that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    values: Map<String, Value>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Stores `value` under `id`; an existing key keeps its position.
    pub fn set(&mut self, id: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(id.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.values)
    }

    /// Builds an answer set from a JSON object; other JSON shapes yield `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(values) => Some(Self { values }),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for AnswerSet {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut answers = AnswerSet::new();
        for (key, value) in iter {
            answers.set(key, value);
        }
        answers
    }
}

/// Formats an answer the way a respondent typed it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overwriting_keeps_key_position() {
        let mut answers = AnswerSet::new();
        answers.set("age", 30);
        answers.set("smoker", "Oui");
        answers.set("age", 31);
        let keys: Vec<_> = answers.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["age", "smoker"]);
        assert_eq!(answers.get("age"), Some(&json!(31)));
    }

    #[test]
    fn from_json_requires_object() {
        assert!(AnswerSet::from_json(json!([1, 2])).is_none());
        let answers = AnswerSet::from_json(json!({ "age": 30 })).expect("object");
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn display_value_strips_quotes() {
        assert_eq!(display_value(&json!("Oui")), "Oui");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&Value::Null), "");
    }
}
