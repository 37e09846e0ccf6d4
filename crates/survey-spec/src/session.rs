use serde::{Deserialize, Serialize};

use crate::answers::AnswerSet;

/// Progress of one respondent through the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// 1-based position in the catalog's page sequence.
    pub current_page: usize,
    pub answers: AnswerSet,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_page: 1,
            answers: AnswerSet::new(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers(answers: AnswerSet) -> Self {
        Self {
            answers,
            ..Self::default()
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self, total_pages: usize) -> bool {
        self.current_page < total_pages
    }

    pub fn is_last_page(&self, total_pages: usize) -> bool {
        self.current_page >= total_pages
    }

    /// Advances one page; a no-op on the last page. Returns whether the page changed.
    pub fn next_page(&mut self, total_pages: usize) -> bool {
        if self.has_next(total_pages) {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    /// Goes back one page, never below page 1. Returns whether the page changed.
    pub fn previous_page(&mut self) -> bool {
        if self.has_previous() {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// Jumps to `page`, clamped into `1..=total_pages`.
    pub fn go_to(&mut self, page: usize, total_pages: usize) {
        self.current_page = page.clamp(1, total_pages.max(1));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_first_page_without_answers() {
        let state = SessionState::new();
        assert_eq!(state.current_page, 1);
        assert!(state.answers.is_empty());
    }

    #[test]
    fn next_stops_at_total_pages() {
        let mut state = SessionState::new();
        assert!(state.next_page(3));
        assert!(state.next_page(3));
        assert!(!state.next_page(3));
        assert_eq!(state.current_page, 3);
        assert!(state.is_last_page(3));
    }

    #[test]
    fn previous_floors_at_one() {
        let mut state = SessionState::new();
        assert!(!state.previous_page());
        state.go_to(2, 4);
        assert!(state.previous_page());
        assert!(!state.previous_page());
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn go_to_clamps() {
        let mut state = SessionState::new();
        state.go_to(9, 3);
        assert_eq!(state.current_page, 3);
        state.go_to(0, 3);
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn reset_clears_answers_and_page() {
        let mut state = SessionState::new();
        state.answers.set("age", 30);
        state.go_to(2, 2);
        state.reset();
        assert_eq!(state, SessionState::new());
    }
}
