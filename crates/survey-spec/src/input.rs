use serde_json::{Number, Value};
use thiserror::Error;

use crate::spec::{NO_LABEL, QuestionDefinition, QuestionType, YES_LABEL};

/// Raw input that does not fit the question's widget.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("'{raw}' is not a number")]
    NotANumber { raw: String },
    #[error("'{raw}' is not one of: {choices}")]
    UnknownChoice { raw: String, choices: String },
    #[error("'{raw}' is not a yes/no answer")]
    NotYesNo { raw: String },
    #[error("questions of type '{kind}' cannot be answered")]
    Unsupported { kind: String },
}

/// Converts typed input into the value stored for `question`.
pub fn parse_input(question: &QuestionDefinition, raw: &str) -> Result<Value, InputError> {
    match &question.kind {
        QuestionType::Text => Ok(Value::String(raw.to_string())),
        QuestionType::Number => parse_number(raw).map(Value::Number),
        QuestionType::Select => parse_choice(&question.options, raw).map(Value::String),
        QuestionType::YesNo => parse_yes_no(raw).map(|label| Value::String(label.to_string())),
        QuestionType::Other(kind) => Err(InputError::Unsupported { kind: kind.clone() }),
    }
}

/// Parses a number, keeping integral input as an integer.
pub fn parse_number(raw: &str) -> Result<Number, InputError> {
    let trimmed = raw.trim();
    let not_a_number = || InputError::NotANumber {
        raw: raw.to_string(),
    };
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(Number::from(value));
    }
    let value = trimmed.parse::<f64>().map_err(|_| not_a_number())?;
    Number::from_f64(value).ok_or_else(not_a_number)
}

/// Matches an option by label (exact, then case-insensitive) or by 1-based position.
pub fn parse_choice(options: &[String], raw: &str) -> Result<String, InputError> {
    let trimmed = raw.trim();
    if let Some(option) = options.iter().find(|option| option.as_str() == trimmed) {
        return Ok(option.clone());
    }
    if let Some(option) = options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(trimmed))
    {
        return Ok(option.clone());
    }
    if let Ok(position) = trimmed.parse::<usize>()
        && let Some(option) = position.checked_sub(1).and_then(|index| options.get(index))
    {
        return Ok(option.clone());
    }
    Err(InputError::UnknownChoice {
        raw: raw.to_string(),
        choices: options.join(", "),
    })
}

/// Maps yes/no spellings onto the two stored labels.
pub fn parse_yes_no(raw: &str) -> Result<&'static str, InputError> {
    match raw.trim().to_lowercase().as_str() {
        "oui" | "o" | "yes" | "y" | "true" | "1" => Ok(YES_LABEL),
        "non" | "n" | "no" | "false" | "0" => Ok(NO_LABEL),
        _ => Err(InputError::NotYesNo {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(kind: QuestionType) -> QuestionDefinition {
        QuestionDefinition::new("q", 1, kind).with_options(["Rouge", "Bleu"])
    }

    #[test]
    fn numbers_keep_integers() {
        assert_eq!(
            parse_input(&question(QuestionType::Number), " 30 "),
            Ok(json!(30))
        );
        assert_eq!(
            parse_input(&question(QuestionType::Number), "72.5"),
            Ok(json!(72.5))
        );
        assert!(matches!(
            parse_input(&question(QuestionType::Number), "thirty"),
            Err(InputError::NotANumber { .. })
        ));
    }

    #[test]
    fn select_accepts_label_or_position() {
        let q = question(QuestionType::Select);
        assert_eq!(parse_input(&q, "Bleu"), Ok(json!("Bleu")));
        assert_eq!(parse_input(&q, "rouge"), Ok(json!("Rouge")));
        assert_eq!(parse_input(&q, "2"), Ok(json!("Bleu")));
        assert!(matches!(
            parse_input(&q, "3"),
            Err(InputError::UnknownChoice { .. })
        ));
    }

    #[test]
    fn yes_no_maps_to_labels() {
        let q = question(QuestionType::YesNo);
        assert_eq!(parse_input(&q, "yes"), Ok(json!(YES_LABEL)));
        assert_eq!(parse_input(&q, "NON"), Ok(json!(NO_LABEL)));
        assert!(parse_input(&q, "maybe").is_err());
    }

    #[test]
    fn text_is_kept_verbatim() {
        let q = question(QuestionType::Text);
        assert_eq!(parse_input(&q, " hello "), Ok(json!(" hello ")));
    }

    #[test]
    fn unknown_types_cannot_be_answered() {
        let q = question(QuestionType::Other("slider".into()));
        assert_eq!(
            parse_input(&q, "3"),
            Err(InputError::Unsupported {
                kind: "slider".into()
            })
        );
    }
}
