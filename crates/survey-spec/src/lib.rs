#![allow(missing_docs)]

pub mod answers;
pub mod catalog;
pub mod expr;
pub mod input;
pub mod render;
pub mod session;
pub mod spec;
pub mod visibility;

pub use answers::{AnswerSet, display_value};
pub use catalog::{Catalog, CatalogCache, CatalogLoadError, ConditionIssue};
pub use expr::{CompareOp, ConditionError, Expr};
pub use input::{InputError, parse_input};
pub use render::{
    Navigation, RenderControl, RenderPayload, Widget, build_render_payload, render_json_ui,
    render_text,
};
pub use session::SessionState;
pub use spec::{NO_LABEL, QuestionDefinition, QuestionType, YES_LABEL};
pub use visibility::{RenderWarning, check_visibility, is_visible};

/// JSON schema describing one catalog row.
pub fn catalog_row_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(QuestionDefinition)).unwrap_or_default()
}
