use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use survey_sink::{SheetBackend, SinkUnavailableError, SubmittedRow, append};
use survey_spec::{
    Catalog, InputError, RenderPayload, SessionState, build_render_payload, parse_input,
};

/// Opaque key of one respondent's session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no session '{0}'")]
    UnknownSession(SessionId),
    #[error("question '{0}' is not in the catalog")]
    UnknownQuestion(String),
    #[error("invalid answer for '{question_id}': {source}")]
    Input {
        question_id: String,
        #[source]
        source: InputError,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("submission is only possible on the last page (currently on page {page} of {total})")]
    NotOnFinalPage { page: usize, total: usize },
    #[error("could not save the answers: {0}")]
    Sink(#[from] SinkUnavailableError),
}

/// A loaded catalog plus every in-progress session that answers it.
///
/// Each handler takes the session id explicitly; the page state is always recomputed from
/// the session and the catalog.
pub struct Questionnaire {
    catalog: Arc<Catalog>,
    sessions: HashMap<SessionId, SessionState>,
    next_id: u64,
}

impl Questionnaire {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn total_pages(&self) -> usize {
        self.catalog.total_pages()
    }

    /// Opens a fresh session on page 1 with no answers.
    pub fn start(&mut self) -> SessionId {
        self.resume(SessionState::new())
    }

    /// Opens a session from previously saved state. The page is clamped into the catalog.
    pub fn resume(&mut self, mut state: SessionState) -> SessionId {
        state.go_to(state.current_page, self.total_pages());
        let id = SessionId(format!("session-{}", self.next_id));
        self.next_id += 1;
        debug!(session = %id, page = state.current_page, "session opened");
        self.sessions.insert(id.clone(), state);
        id
    }

    /// Drops a session, returning its last state.
    pub fn end(&mut self, id: &SessionId) -> Option<SessionState> {
        self.sessions.remove(id)
    }

    pub fn session(&self, id: &SessionId) -> Result<&SessionState, EngineError> {
        self.sessions
            .get(id)
            .ok_or_else(|| EngineError::UnknownSession(id.clone()))
    }

    fn session_mut(&mut self, id: &SessionId) -> Result<&mut SessionState, EngineError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownSession(id.clone()))
    }

    /// Renders the session's current page, committing control defaults into its answers.
    pub fn render(&mut self, id: &SessionId) -> Result<RenderPayload, EngineError> {
        let catalog = Arc::clone(&self.catalog);
        let session = self.session_mut(id)?;
        Ok(build_render_payload(&catalog, session))
    }

    /// Parses `raw` for the question's type and stores it.
    pub fn answer(
        &mut self,
        id: &SessionId,
        question_id: &str,
        raw: &str,
    ) -> Result<Value, EngineError> {
        let question = self
            .catalog
            .question(question_id)
            .ok_or_else(|| EngineError::UnknownQuestion(question_id.to_string()))?;
        let value = parse_input(question, raw).map_err(|source| EngineError::Input {
            question_id: question_id.to_string(),
            source,
        })?;
        self.set_value(id, question_id, value.clone())?;
        Ok(value)
    }

    /// Stores an already typed value.
    pub fn set_value(
        &mut self,
        id: &SessionId,
        question_id: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        if self.catalog.question(question_id).is_none() {
            return Err(EngineError::UnknownQuestion(question_id.to_string()));
        }
        let session = self.session_mut(id)?;
        debug!(session = %id, question = question_id, value = %value, "answer recorded");
        session.answers.set(question_id, value);
        Ok(())
    }

    /// Moves forward one page; a no-op on the last page.
    pub fn next_page(&mut self, id: &SessionId) -> Result<bool, EngineError> {
        let total = self.total_pages();
        let session = self.session_mut(id)?;
        let moved = session.next_page(total);
        debug!(session = %id, page = session.current_page, moved, "next page");
        Ok(moved)
    }

    /// Moves back one page; a no-op on page 1.
    pub fn previous_page(&mut self, id: &SessionId) -> Result<bool, EngineError> {
        let session = self.session_mut(id)?;
        let moved = session.previous_page();
        debug!(session = %id, page = session.current_page, moved, "previous page");
        Ok(moved)
    }

    /// Appends the session's answers to `sink` stamped with the current local time.
    pub fn submit(
        &mut self,
        id: &SessionId,
        sink: &dyn SheetBackend,
    ) -> Result<SubmittedRow, SubmitError> {
        self.submit_at(id, sink, &Local::now())
    }

    /// Appends the session's answers to `sink` stamped with `now`.
    ///
    /// The current page is rendered into a copy of the session so its control defaults are
    /// part of the row. On success the session starts over on page 1; on failure it is left
    /// untouched so the respondent can retry.
    pub fn submit_at(
        &mut self,
        id: &SessionId,
        sink: &dyn SheetBackend,
        now: &DateTime<Local>,
    ) -> Result<SubmittedRow, SubmitError> {
        let total = self.total_pages();
        let page = self.session(id)?.current_page;
        if page < total {
            return Err(SubmitError::NotOnFinalPage { page, total });
        }
        let mut staged = self.session(id)?.clone();
        build_render_payload(&self.catalog, &mut staged);

        let row = SubmittedRow::stamp_at(staged.answers.as_map().clone(), now);
        match append(sink, &row) {
            Ok(outcome) => {
                info!(
                    session = %id,
                    destination = %sink.describe(),
                    fields = row.fields().len(),
                    wrote_header = outcome.wrote_header,
                    "questionnaire submitted"
                );
                self.session_mut(id)?.reset();
                Ok(row)
            }
            Err(err) => {
                warn!(session = %id, error = %err, "submission failed; answers kept");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use survey_sink::MemorySheet;
    use survey_spec::{QuestionDefinition, QuestionType};

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::from_questions(vec![
                QuestionDefinition::new("age", 1, QuestionType::Number),
                QuestionDefinition::new("smoker", 1, QuestionType::YesNo),
                QuestionDefinition::new("years_smoked", 2, QuestionType::Number)
                    .with_condition("smoker == 'Oui'"),
            ])
            .expect("catalog"),
        )
    }

    #[test]
    fn hidden_question_appears_once_condition_holds() {
        let mut survey = Questionnaire::new(catalog());
        let id = survey.start();
        survey.answer(&id, "age", "30").expect("age");
        survey.answer(&id, "smoker", "non").expect("smoker");
        assert!(survey.next_page(&id).expect("next"));

        let page = survey.render(&id).expect("render");
        assert!(!page.is_rendered("years_smoked"));
        assert!(page.warnings.is_empty());

        survey.set_value(&id, "smoker", json!("Oui")).expect("set");
        let page = survey.render(&id).expect("render");
        assert!(page.is_rendered("years_smoked"));
    }

    #[test]
    fn answer_rejects_unknown_question_and_bad_input() {
        let mut survey = Questionnaire::new(catalog());
        let id = survey.start();
        assert!(matches!(
            survey.answer(&id, "nope", "1"),
            Err(EngineError::UnknownQuestion(_))
        ));
        let err = survey.answer(&id, "age", "thirty").expect_err("not a number");
        assert!(matches!(err, EngineError::Input { .. }));
        assert!(survey.session(&id).expect("session").answers.is_empty());
    }

    #[test]
    fn next_page_stops_at_last_page() {
        let mut survey = Questionnaire::new(catalog());
        let id = survey.start();
        assert!(survey.next_page(&id).expect("next"));
        assert!(!survey.next_page(&id).expect("no-op"));
        assert_eq!(survey.session(&id).expect("session").current_page, 2);
        assert!(survey.previous_page(&id).expect("prev"));
        assert!(!survey.previous_page(&id).expect("floor"));
    }

    #[test]
    fn submit_before_last_page_is_refused() {
        let mut survey = Questionnaire::new(catalog());
        let id = survey.start();
        let sheet = MemorySheet::new("responses");
        assert!(matches!(
            survey.submit(&id, &sheet),
            Err(SubmitError::NotOnFinalPage { page: 1, total: 2 })
        ));
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn failed_submission_keeps_answers_and_retry_succeeds() {
        let mut survey = Questionnaire::new(catalog());
        let id = survey.start();
        survey.render(&id).expect("render");
        survey.answer(&id, "age", "30").expect("age");
        survey.answer(&id, "smoker", "non").expect("smoker");
        survey.next_page(&id).expect("next");

        let sheet = MemorySheet::new("responses");
        sheet.set_reachable(false);
        let err = survey.submit(&id, &sheet).expect_err("offline");
        assert!(matches!(err, SubmitError::Sink(_)));
        let state = survey.session(&id).expect("session");
        assert_eq!(state.current_page, 2);
        assert_eq!(state.answers.get("age"), Some(&json!(30)));

        sheet.set_reachable(true);
        let row = survey.submit(&id, &sheet).expect("retry");
        assert_eq!(row.header(), vec!["age", "smoker", "timestamp"]);
        assert_eq!(sheet.rows().len(), 2);

        let state = survey.session(&id).expect("session");
        assert_eq!(state, &SessionState::new());
    }

    #[test]
    fn failed_submission_does_not_commit_unrendered_defaults() {
        let mut survey = Questionnaire::new(catalog());
        let id = survey.start();
        survey.set_value(&id, "age", json!(30)).expect("age");
        survey.set_value(&id, "smoker", json!("Oui")).expect("smoker");
        survey.next_page(&id).expect("next");
        let before = survey.session(&id).expect("session").clone();

        let sheet = MemorySheet::new("responses");
        sheet.set_reachable(false);
        survey.submit(&id, &sheet).expect_err("offline");
        assert_eq!(survey.session(&id).expect("session"), &before);
        assert!(!before.answers.contains("years_smoked"));

        sheet.set_reachable(true);
        let row = survey.submit(&id, &sheet).expect("retry");
        assert_eq!(row.header(), vec!["age", "smoker", "years_smoked", "timestamp"]);
    }

    #[test]
    fn sessions_are_independent() {
        let mut survey = Questionnaire::new(catalog());
        let first = survey.start();
        let second = survey.start();
        assert_ne!(first, second);
        survey.answer(&first, "age", "30").expect("age");
        assert!(survey.session(&second).expect("second").answers.is_empty());

        survey.end(&first);
        assert!(matches!(
            survey.render(&first),
            Err(EngineError::UnknownSession(_))
        ));
    }
}
