//! Question catalog loading and page layout.

mod cache;
mod table;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::expr::{ConditionError, Expr, is_reserved_word};
use crate::spec::{QuestionDefinition, QuestionType};

pub use cache::CatalogCache;

use table::RawTable;

/// Fatal problems with the question source.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("question catalog not found: {path}")]
    NotFound { path: PathBuf },
    #[error("unsupported catalog format: {path} (expected .csv, .xlsx, .xls or .ods)")]
    UnsupportedFormat { path: PathBuf },
    #[error("failed to read catalog {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("required column '{column}' missing from catalog")]
    MissingColumn { column: &'static str },
    #[error("row {row}: required field '{field}' is empty")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: page '{value}' is not a positive integer")]
    InvalidPage { row: usize, value: String },
    #[error("question id '{id}' is defined more than once")]
    DuplicateId { id: String },
    #[error("question catalog contains no questions")]
    Empty,
}

/// A condition that will not evaluate cleanly, found by [`Catalog::check_conditions`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionIssue {
    #[error("{question_id}: invalid condition ({error})")]
    Invalid {
        question_id: String,
        error: ConditionError,
    },
    #[error("{question_id}: condition refers to unknown question '{reference}'")]
    UnknownReference {
        question_id: String,
        reference: String,
    },
}

/// Ordered, read-only collection of question definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    questions: Vec<QuestionDefinition>,
    pages: Vec<u32>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids, zero pages and empty input.
    pub fn from_questions(questions: Vec<QuestionDefinition>) -> Result<Self, CatalogLoadError> {
        if questions.is_empty() {
            return Err(CatalogLoadError::Empty);
        }
        let mut seen = HashSet::new();
        for (index, question) in questions.iter().enumerate() {
            if question.page == 0 {
                return Err(CatalogLoadError::InvalidPage {
                    row: index + 1,
                    value: "0".into(),
                });
            }
            if !seen.insert(question.id.as_str()) {
                return Err(CatalogLoadError::DuplicateId {
                    id: question.id.clone(),
                });
            }
            if !referenceable(&question.id) {
                tracing::warn!(
                    question = %question.id,
                    "question id is not a valid identifier or is a reserved word; \
                     conditions cannot reference it"
                );
            }
        }
        let pages = questions
            .iter()
            .map(|question| question.page)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Ok(Self { questions, pages })
    }

    /// Reads a `.csv` file or the first worksheet of a workbook.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let table = table::read_table(path)?;
        let catalog = Self::from_questions(parse_rows(&table)?)?;
        tracing::info!(
            path = %path.display(),
            questions = catalog.len(),
            pages = catalog.total_pages(),
            "loaded question catalog"
        );
        for issue in catalog.check_conditions() {
            match issue {
                ConditionIssue::Invalid { question_id, error } => {
                    tracing::warn!(question = %question_id, %error, "condition will not parse");
                }
                ConditionIssue::UnknownReference {
                    question_id,
                    reference,
                } => {
                    tracing::warn!(
                        question = %question_id,
                        reference = %reference,
                        "condition references an id that is not in the catalog"
                    );
                }
            }
        }
        Ok(catalog)
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        &self.questions
    }

    pub fn question(&self, id: &str) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|question| question.id == id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Distinct page values in ascending order.
    pub fn page_values(&self) -> &[u32] {
        &self.pages
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// Page value shown at 1-based `position`.
    pub fn page_value(&self, position: usize) -> Option<u32> {
        position
            .checked_sub(1)
            .and_then(|index| self.pages.get(index).copied())
    }

    /// Questions displayed at 1-based `position`, in catalog order.
    pub fn questions_on_page(&self, position: usize) -> impl Iterator<Item = &QuestionDefinition> {
        let page = self.page_value(position);
        self.questions
            .iter()
            .filter(move |question| Some(question.page) == page)
    }

    /// Parses every condition and reports the ones that cannot evaluate.
    pub fn check_conditions(&self) -> Vec<ConditionIssue> {
        let known: HashSet<&str> = self.questions.iter().map(|q| q.id.as_str()).collect();
        let mut issues = Vec::new();
        for question in &self.questions {
            let Some(condition) = question.active_condition() else {
                continue;
            };
            match Expr::parse(condition) {
                Err(error) => issues.push(ConditionIssue::Invalid {
                    question_id: question.id.clone(),
                    error,
                }),
                Ok(expr) => {
                    for reference in expr.variables() {
                        if !known.contains(reference) {
                            issues.push(ConditionIssue::UnknownReference {
                                question_id: question.id.clone(),
                                reference: reference.to_string(),
                            });
                        }
                    }
                }
            }
        }
        issues
    }

    /// Questions grouped by page value.
    pub fn by_page(&self) -> BTreeMap<u32, Vec<&QuestionDefinition>> {
        let mut pages: BTreeMap<u32, Vec<&QuestionDefinition>> = BTreeMap::new();
        for question in &self.questions {
            pages.entry(question.page).or_default().push(question);
        }
        pages
    }
}

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[\p{Alphabetic}_][\p{Alphabetic}\p{Nd}_]*$").ok())
        .as_ref()
}

/// Whether a condition can name this id.
fn referenceable(id: &str) -> bool {
    identifier_pattern().is_none_or(|pattern| pattern.is_match(id)) && !is_reserved_word(id)
}

fn parse_rows(table: &RawTable) -> Result<Vec<QuestionDefinition>, CatalogLoadError> {
    let column = |name: &'static str| {
        table
            .column(name)
            .ok_or(CatalogLoadError::MissingColumn { column: name })
    };
    let id_col = column("id")?;
    let page_col = column("page")?;
    let text_col = column("question")?;
    let type_col = column("type")?;
    let options_col = table.column("options");
    let condition_col = table.column("condition");

    let mut questions = Vec::new();
    for (index, row) in table.rows.iter().enumerate() {
        // header is row 1
        let row_number = index + 2;
        let cell = |col: usize| row.get(col).map(|value| value.trim()).unwrap_or_default();
        if row.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        let required = |col: usize, field: &'static str| {
            let value = cell(col);
            if value.is_empty() {
                Err(CatalogLoadError::MissingField {
                    row: row_number,
                    field,
                })
            } else {
                Ok(value)
            }
        };
        let id = required(id_col, "id")?;
        let page_text = required(page_col, "page")?;
        let text = required(text_col, "question")?;
        let kind = required(type_col, "type")?;

        let page = parse_page(page_text).ok_or_else(|| CatalogLoadError::InvalidPage {
            row: row_number,
            value: page_text.to_string(),
        })?;
        let options = options_col
            .map(cell)
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|option| !option.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let condition = condition_col
            .map(cell)
            .filter(|condition| !condition.is_empty())
            .map(str::to_string);

        questions.push(QuestionDefinition {
            id: id.to_string(),
            page,
            text: text.to_string(),
            kind: QuestionType::from_label(kind),
            options,
            condition,
        });
    }
    Ok(questions)
}

fn parse_page(text: &str) -> Option<u32> {
    let page = text.parse::<u32>().ok().or_else(|| {
        let value = text.parse::<f64>().ok()?;
        (value.fract() == 0.0 && value >= 1.0 && value <= f64::from(u32::MAX)).then_some(value as u32)
    })?;
    (page >= 1).then_some(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    const HEADERS: &[&str] = &["id", "page", "question", "type", "options", "condition"];

    #[test]
    fn reserved_words_cannot_be_referenced() {
        assert!(referenceable("smoker"));
        assert!(referenceable("years_smoked"));
        assert!(!referenceable("2nd_visit"));
        for id in ["and", "in", "not", "True", "None"] {
            assert!(!referenceable(id), "{id}");
        }
    }

    #[test]
    fn parses_rows_with_options_and_conditions() {
        let table = table(
            HEADERS,
            &[
                &["color", "1", "Color?", "select", "red; blue ;", ""],
                &["", "", "", "", "", ""],
                &["shade", "3.0", "Shade?", "text", "", "color == 'blue'"],
            ],
        );
        let questions = parse_rows(&table).expect("parse");
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options, vec!["red", "blue"]);
        assert_eq!(questions[0].condition, None);
        assert_eq!(questions[1].page, 3);
        assert_eq!(questions[1].condition.as_deref(), Some("color == 'blue'"));
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let table = table(&["ID", "Page", "Question", "Type"], &[&["age", "1", "Age?", "number"]]);
        let questions = parse_rows(&table).expect("parse");
        assert!(questions[0].options.is_empty());
        assert!(questions[0].condition.is_none());
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let table = table(&["id", "page", "question"], &[&["age", "1", "Age?"]]);
        assert!(matches!(
            parse_rows(&table),
            Err(CatalogLoadError::MissingColumn { column: "type" })
        ));
    }

    #[test]
    fn empty_required_field_reports_row() {
        let table = table(HEADERS, &[&["age", "", "Age?", "number", "", ""]]);
        assert!(matches!(
            parse_rows(&table),
            Err(CatalogLoadError::MissingField {
                row: 2,
                field: "page"
            })
        ));
    }

    #[test]
    fn rejects_non_positive_pages() {
        for bad in ["0", "-1", "1.5", "two"] {
            let table = table(HEADERS, &[&["age", bad, "Age?", "number", "", ""]]);
            assert!(
                matches!(parse_rows(&table), Err(CatalogLoadError::InvalidPage { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn pages_are_sorted_distinct_values() {
        let catalog = Catalog::from_questions(vec![
            QuestionDefinition::new("c", 10, QuestionType::Text),
            QuestionDefinition::new("a", 2, QuestionType::Text),
            QuestionDefinition::new("b", 10, QuestionType::Text),
            QuestionDefinition::new("d", 5, QuestionType::Text),
        ])
        .expect("catalog");
        assert_eq!(catalog.page_values(), &[2u32, 5, 10]);
        assert_eq!(catalog.total_pages(), 3);
        assert_eq!(catalog.page_value(2), Some(5));
        assert_eq!(catalog.page_value(0), None);
        let third: Vec<_> = catalog.questions_on_page(3).map(|q| q.id.as_str()).collect();
        assert_eq!(third, vec!["c", "b"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = Catalog::from_questions(vec![
            QuestionDefinition::new("a", 1, QuestionType::Text),
            QuestionDefinition::new("a", 2, QuestionType::Text),
        ]);
        assert!(matches!(result, Err(CatalogLoadError::DuplicateId { id }) if id == "a"));
        assert!(matches!(
            Catalog::from_questions(Vec::new()),
            Err(CatalogLoadError::Empty)
        ));
    }

    #[test]
    fn check_conditions_flags_bad_and_dangling_references() {
        let catalog = Catalog::from_questions(vec![
            QuestionDefinition::new("a", 1, QuestionType::Text),
            QuestionDefinition::new("b", 1, QuestionType::Text).with_condition("a = 1"),
            QuestionDefinition::new("c", 2, QuestionType::Text).with_condition("ghost == 1"),
            QuestionDefinition::new("d", 2, QuestionType::Text).with_condition("a == 'x'"),
        ])
        .expect("catalog");
        let issues = catalog.check_conditions();
        assert_eq!(issues.len(), 2);
        assert!(matches!(&issues[0], ConditionIssue::Invalid { question_id, .. } if question_id == "b"));
        assert!(matches!(
            &issues[1],
            ConditionIssue::UnknownReference { reference, .. } if reference == "ghost"
        ));
    }
}
