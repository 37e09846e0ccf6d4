pub mod question;

pub use question::{NO_LABEL, QuestionDefinition, QuestionType, YES_LABEL};
