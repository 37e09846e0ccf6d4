use thiserror::Error;

use crate::answers::AnswerSet;
use crate::expr::{ConditionError, Expr};
use crate::spec::QuestionDefinition;

/// Non-fatal problems met while rendering a page.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderWarning {
    #[error("Invalid condition for {question_id}: {condition} ({error})")]
    InvalidCondition {
        question_id: String,
        condition: String,
        #[source]
        error: ConditionError,
    },
    #[error("Unknown question type: {kind} ({question_id})")]
    UnknownQuestionType { question_id: String, kind: String },
}

impl RenderWarning {
    pub fn question_id(&self) -> &str {
        match self {
            RenderWarning::InvalidCondition { question_id, .. }
            | RenderWarning::UnknownQuestionType { question_id, .. } => question_id,
        }
    }
}

/// Evaluates the question's condition, surfacing parse and lookup failures.
pub fn check_visibility(
    question: &QuestionDefinition,
    answers: &AnswerSet,
) -> Result<bool, ConditionError> {
    match question.active_condition() {
        None => Ok(true),
        Some(condition) => Expr::parse(condition)?.evaluate_bool(answers),
    }
}

/// Decides whether `question` is shown for `answers`.
///
/// A condition that fails to parse or evaluate hides the question and records exactly one
/// warning.
pub fn is_visible(
    question: &QuestionDefinition,
    answers: &AnswerSet,
    warnings: &mut Vec<RenderWarning>,
) -> bool {
    match check_visibility(question, answers) {
        Ok(visible) => visible,
        Err(error) => {
            tracing::warn!(
                question = %question.id,
                condition = question.condition.as_deref().unwrap_or_default(),
                %error,
                "hiding question with invalid condition"
            );
            warnings.push(RenderWarning::InvalidCondition {
                question_id: question.id.clone(),
                condition: question.condition.clone().unwrap_or_default(),
                error,
            });
            false
        }
    }
}
