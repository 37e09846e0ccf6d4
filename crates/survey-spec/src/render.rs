use serde_json::{Map, Number, Value, json};

use crate::{
    answers::{AnswerSet, display_value},
    catalog::Catalog,
    input::parse_number,
    session::SessionState,
    spec::{NO_LABEL, QuestionDefinition, QuestionType, YES_LABEL},
    visibility::{RenderWarning, is_visible},
};

/// Input widget for one question, already seeded with its current value.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    TextInput {
        value: String,
    },
    NumberInput {
        value: Number,
    },
    /// `index` is `None` only when the question has no options.
    SelectBox {
        options: Vec<String>,
        index: Option<usize>,
    },
    Radio {
        options: Vec<String>,
        index: usize,
    },
}

impl Widget {
    /// Value the widget currently holds.
    pub fn value(&self) -> Option<Value> {
        match self {
            Widget::TextInput { value } => Some(Value::String(value.clone())),
            Widget::NumberInput { value } => Some(Value::Number(value.clone())),
            Widget::SelectBox { options, index } => index
                .and_then(|index| options.get(index))
                .map(|option| Value::String(option.clone())),
            Widget::Radio { options, index } => {
                options.get(*index).map(|option| Value::String(option.clone()))
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Widget::TextInput { .. } => "text_input",
            Widget::NumberInput { .. } => "number_input",
            Widget::SelectBox { .. } => "selectbox",
            Widget::Radio { .. } => "radio",
        }
    }
}

/// One rendered question.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderControl {
    pub id: String,
    pub label: String,
    pub kind: QuestionType,
    pub widget: Widget,
}

/// Actions offered below the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub previous: bool,
    pub next: bool,
    pub submit: bool,
}

/// Everything needed to draw the current page.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    /// 1-based page position.
    pub page: usize,
    pub total_pages: usize,
    /// Catalog page value behind `page`.
    pub page_value: Option<u32>,
    pub controls: Vec<RenderControl>,
    pub warnings: Vec<RenderWarning>,
    pub navigation: Navigation,
    /// Answers after the seeded values were written back.
    pub answers: AnswerSet,
}

impl RenderPayload {
    pub fn control(&self, id: &str) -> Option<&RenderControl> {
        self.controls.iter().find(|control| control.id == id)
    }

    pub fn is_rendered(&self, id: &str) -> bool {
        self.control(id).is_some()
    }
}

/// Renders the session's current page.
///
/// Each visible question gets one control seeded from the stored answer or a type default,
/// and that seeded value is written back into the answers the way an input widget reports
/// its value. Rendering again without new input leaves the answers untouched.
pub fn build_render_payload(catalog: &Catalog, session: &mut SessionState) -> RenderPayload {
    let total_pages = catalog.total_pages();
    let page = session.current_page;
    let mut warnings = Vec::new();
    let mut controls = Vec::new();

    for question in catalog.questions_on_page(page) {
        if !is_visible(question, &session.answers, &mut warnings) {
            continue;
        }
        let Some(widget) = seed_widget(question, &session.answers) else {
            tracing::warn!(
                question = %question.id,
                kind = %question.kind,
                "skipping question with unknown type"
            );
            warnings.push(RenderWarning::UnknownQuestionType {
                question_id: question.id.clone(),
                kind: question.kind.to_string(),
            });
            continue;
        };
        if let Some(value) = widget.value()
            && session.answers.get(&question.id) != Some(&value)
        {
            session.answers.set(question.id.clone(), value);
        }
        controls.push(RenderControl {
            id: question.id.clone(),
            label: question.text.clone(),
            kind: question.kind.clone(),
            widget,
        });
    }

    RenderPayload {
        page,
        total_pages,
        page_value: catalog.page_value(page),
        controls,
        warnings,
        navigation: Navigation {
            previous: session.has_previous(),
            next: session.has_next(total_pages),
            submit: session.is_last_page(total_pages),
        },
        answers: session.answers.clone(),
    }
}

fn seed_widget(question: &QuestionDefinition, answers: &AnswerSet) -> Option<Widget> {
    let stored = answers.get(&question.id);
    let widget = match &question.kind {
        QuestionType::Text => Widget::TextInput {
            value: stored.map(display_value).unwrap_or_default(),
        },
        QuestionType::Number => Widget::NumberInput {
            value: stored.and_then(stored_number).unwrap_or_else(|| Number::from(0)),
        },
        QuestionType::Select => {
            let index = (!question.options.is_empty()).then(|| {
                stored
                    .and_then(Value::as_str)
                    .and_then(|value| question.options.iter().position(|option| option == value))
                    .unwrap_or_else(|| {
                        if let Some(value) = stored {
                            tracing::debug!(
                                question = %question.id,
                                stored = %display_value(value),
                                "stored answer is not among the options; selecting the first"
                            );
                        }
                        0
                    })
            });
            Widget::SelectBox {
                options: question.options.clone(),
                index,
            }
        }
        QuestionType::YesNo => Widget::Radio {
            options: vec![YES_LABEL.to_string(), NO_LABEL.to_string()],
            index: usize::from(stored.and_then(Value::as_str) == Some(NO_LABEL)),
        },
        QuestionType::Other(_) => return None,
    };
    Some(widget)
}

fn stored_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(number) => Some(number.clone()),
        Value::String(text) => parse_number(text).ok(),
        _ => None,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let controls = payload
        .controls
        .iter()
        .map(|control| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(control.id.clone()));
            map.insert("label".into(), Value::String(control.label.clone()));
            map.insert("type".into(), Value::String(control.kind.to_string()));
            map.insert(
                "widget".into(),
                Value::String(control.widget.label().to_string()),
            );
            map.insert(
                "value".into(),
                control.widget.value().unwrap_or(Value::Null),
            );
            match &control.widget {
                Widget::SelectBox { options, index } => {
                    map.insert("options".into(), json!(options));
                    map.insert("index".into(), json!(index));
                }
                Widget::Radio { options, index } => {
                    map.insert("options".into(), json!(options));
                    map.insert("index".into(), json!(index));
                }
                Widget::TextInput { .. } | Widget::NumberInput { .. } => {}
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    let warnings = payload
        .warnings
        .iter()
        .map(|warning| {
            json!({
                "question_id": warning.question_id(),
                "message": warning.to_string(),
            })
        })
        .collect::<Vec<_>>();

    json!({
        "page": payload.page,
        "total_pages": payload.total_pages,
        "page_value": payload.page_value,
        "controls": controls,
        "warnings": warnings,
        "navigation": {
            "previous": payload.navigation.previous,
            "next": payload.navigation.next,
            "submit": payload.navigation.submit,
        },
        "answers": payload.answers.to_json(),
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload, show_answers: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Page {}/{}", payload.page, payload.total_pages));

    for warning in &payload.warnings {
        lines.push(format!("Warning: {}", warning));
    }

    if payload.controls.is_empty() {
        lines.push("No questions to answer on this page.".to_string());
    }
    for control in &payload.controls {
        let value = control
            .widget
            .value()
            .map(|value| display_value(&value))
            .unwrap_or_default();
        let mut entry = format!(" - {}", control.label);
        match &control.widget {
            Widget::SelectBox { options, .. } | Widget::Radio { options, .. } => {
                entry.push_str(&format!(" ({})", options.join("/")));
            }
            Widget::NumberInput { .. } => entry.push_str(" (number)"),
            Widget::TextInput { .. } => {}
        }
        entry.push_str(&format!(" = {}", value));
        lines.push(entry);
    }

    let mut actions = Vec::new();
    if payload.navigation.previous {
        actions.push("previous");
    }
    if payload.navigation.next {
        actions.push("next");
    }
    if payload.navigation.submit {
        actions.push("submit");
    }
    lines.push(format!("Actions: {}", actions.join(", ")));

    if show_answers {
        lines.push("Answers so far:".to_string());
        lines.push(
            payload
                .answers
                .to_json_pretty()
                .unwrap_or_else(|_| payload.answers.to_json().to_string()),
        );
    }

    lines.join("\n")
}
