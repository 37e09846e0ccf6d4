use chrono::{DateTime, Local, TimeZone};
use serde_json::{Map, Value};

/// Column that receives the submission time.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// `strftime` layout of [`TIMESTAMP_FIELD`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Answers of one completed questionnaire plus the submission timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedRow {
    fields: Map<String, Value>,
}

impl SubmittedRow {
    /// Stamps `answers` with the current local time.
    pub fn stamp(answers: Map<String, Value>) -> Self {
        Self::stamp_at(answers, &Local::now())
    }

    /// Stamps `answers` with `at`. An existing `timestamp` answer is overwritten in place.
    pub fn stamp_at<Tz>(mut answers: Map<String, Value>, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        answers.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(at.format(TIMESTAMP_FORMAT).to_string()),
        );
        Self { fields: answers }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Field names in row order.
    pub fn header(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Values in row order.
    pub fn values(&self) -> Vec<Value> {
        self.fields.values().cloned().collect()
    }

    /// Values arranged under an existing `header`.
    ///
    /// Columns without a matching field are left empty. Fields the header does not know are
    /// appended after the known columns and returned by name so callers can report them.
    pub fn values_for(&self, header: &[String]) -> (Vec<Value>, Vec<String>) {
        let mut values: Vec<Value> = header
            .iter()
            .map(|column| {
                self.fields
                    .get(column)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()))
            })
            .collect();
        let mut extra = Vec::new();
        for (name, value) in &self.fields {
            if !header.contains(name) {
                values.push(value.clone());
                extra.push(name.clone());
            }
        }
        (values, extra)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get(TIMESTAMP_FIELD).and_then(Value::as_str)
    }
}

/// Text form of a cell for destinations that only store strings.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at() -> DateTime<chrono::Utc> {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 3))
            .expect("valid date")
            .and_utc()
    }

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn timestamp_is_appended_last() {
        let row = SubmittedRow::stamp_at(answers(json!({ "age": 30, "smoker": "Oui" })), &at());
        assert_eq!(row.header(), vec!["age", "smoker", "timestamp"]);
        assert_eq!(row.timestamp(), Some("2024-03-09 07:05:03"));
    }

    #[test]
    fn existing_timestamp_answer_is_overwritten_in_place() {
        let row = SubmittedRow::stamp_at(answers(json!({ "timestamp": "x", "age": 1 })), &at());
        assert_eq!(row.header(), vec!["timestamp", "age"]);
        assert_eq!(row.timestamp(), Some("2024-03-09 07:05:03"));
    }

    #[test]
    fn values_follow_existing_header() {
        let row = SubmittedRow::stamp_at(answers(json!({ "smoker": "Non", "age": 45, "new": 1 })), &at());
        let header: Vec<String> = ["age", "smoker", "missing", "timestamp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (values, extra) = row.values_for(&header);
        assert_eq!(
            values,
            vec![json!(45), json!("Non"), json!(""), json!("2024-03-09 07:05:03"), json!(1)]
        );
        assert_eq!(extra, vec!["new"]);
    }
}
