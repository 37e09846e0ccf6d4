use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label stored for an affirmative `yesno` answer.
pub const YES_LABEL: &str = "Oui";
/// Label stored for a negative `yesno` answer.
pub const NO_LABEL: &str = "Non";

/// Widget family of a question.
///
/// Unrecognised labels are kept as [`QuestionType::Other`] so a catalog with a typo still
/// loads; the renderer skips those questions with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    Text,
    Number,
    Select,
    YesNo,
    Other(String),
}

impl QuestionType {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "text" => QuestionType::Text,
            "number" => QuestionType::Number,
            "select" => QuestionType::Select,
            "yesno" => QuestionType::YesNo,
            _ => QuestionType::Other(label.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Number => "number",
            QuestionType::Select => "select",
            QuestionType::YesNo => "yesno",
            QuestionType::Other(label) => label,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, QuestionType::Other(_))
    }
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        QuestionType::from_label(&value)
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the question catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionDefinition {
    /// Unique identifier, also the variable name used by conditions.
    pub id: String,
    /// Page grouping; the sorted distinct values form the page sequence.
    pub page: u32,
    /// Text shown to the respondent.
    #[serde(rename = "question")]
    pub text: String,
    /// One of `text`, `number`, `select`, `yesno`.
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: QuestionType,
    /// Choices for `select` questions, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Visibility expression; absent means always visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl QuestionDefinition {
    pub fn new(id: impl Into<String>, page: u32, kind: QuestionType) -> Self {
        let id = id.into();
        Self {
            text: id.clone(),
            id,
            page,
            kind,
            options: Vec::new(),
            condition: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.condition = if condition.trim().is_empty() {
            None
        } else {
            Some(condition)
        };
        self
    }

    /// Condition text when it carries an expression.
    pub fn active_condition(&self) -> Option<&str> {
        self.condition
            .as_deref()
            .map(str::trim)
            .filter(|condition| !condition.is_empty())
    }
}
