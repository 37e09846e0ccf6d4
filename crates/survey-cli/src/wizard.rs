use survey_sink::{SinkUnavailableError, SubmittedRow};
use survey_spec::{
    InputError, Navigation, RenderControl, RenderPayload, Widget, display_value,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: page header and prompts only.
    Clean,
    /// Verbose output: question ids and the answers collected so far.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints pages, prompts and outcomes for the text wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            show_answers_json,
        }
    }

    pub fn show_page(&self, payload: &RenderPayload) {
        println!();
        println!("Page {}/{}", payload.page, payload.total_pages);
        for warning in &payload.warnings {
            eprintln!("Warning: {}", warning);
        }
        if payload.controls.is_empty() {
            println!("No questions to answer on this page.");
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = prompt.label.clone();
        if self.verbosity.is_verbose() {
            line.push_str(&format!(" [{}]", prompt.id));
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if !prompt.current.is_empty() {
            line.push_str(&format!(" (current: {})", prompt.current));
        }
        println!("{}", line);
    }

    pub fn show_input_error(&self, error: &InputError) {
        eprintln!("Invalid answer: {}", error);
    }

    /// The in-progress answers, as the wizard would submit them now.
    pub fn show_answers(&self, payload: &RenderPayload) {
        if !(self.show_answers_json || self.verbosity.is_verbose()) {
            return;
        }
        match payload.answers.to_json_pretty() {
            Ok(pretty) => println!("Answers so far:\n{}", pretty),
            Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
        }
    }

    pub fn show_actions(&self, navigation: &Navigation) {
        let mut actions = Vec::new();
        if navigation.previous {
            actions.push("[p]revious");
        }
        if navigation.next {
            actions.push("[n]ext");
        }
        if navigation.submit {
            actions.push("[s]ubmit");
        }
        actions.push("[q]uit");
        println!(
            "Action: {} (default: {})",
            actions.join(", "),
            Action::default_for(navigation).as_str()
        );
    }

    pub fn show_submitted(&self, row: &SubmittedRow) {
        println!("Thank you! Your answers have been saved.");
        if self.verbosity.is_verbose() {
            println!(
                "Submitted {} fields at {}",
                row.fields().len(),
                row.timestamp().unwrap_or_default()
            );
        }
    }

    pub fn show_submit_error(&self, error: &SinkUnavailableError) {
        eprintln!("Could not save your answers: {}", error);
        eprintln!("Your answers are kept; try submitting again.");
    }
}

/// Everything needed to print the prompt for one control.
pub struct PromptContext {
    pub id: String,
    pub label: String,
    pub hint: Option<String>,
    pub current: String,
}

impl PromptContext {
    pub fn new(control: &RenderControl) -> Self {
        let hint = match &control.widget {
            Widget::TextInput { .. } => None,
            Widget::NumberInput { .. } => Some("(number)".to_string()),
            Widget::SelectBox { options, .. } => Some(format!(
                "({}, or 1-{})",
                options.join("/"),
                options.len()
            )),
            Widget::Radio { options, .. } => Some(format!("({})", options.join("/"))),
        };
        Self {
            id: control.id.clone(),
            label: control.label.clone(),
            hint,
            current: control
                .widget
                .value()
                .map(|value| display_value(&value))
                .unwrap_or_default(),
        }
    }
}

/// What the respondent asked for at the end of a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Previous,
    Next,
    Submit,
    Quit,
}

impl Action {
    /// The action taken on a blank line: move on, or submit from the last page.
    pub fn default_for(navigation: &Navigation) -> Self {
        if navigation.next {
            Action::Next
        } else if navigation.submit {
            Action::Submit
        } else {
            Action::Quit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Previous => "previous",
            Action::Next => "next",
            Action::Submit => "submit",
            Action::Quit => "quit",
        }
    }

    /// Parses a typed action, accepting only the ones offered by `navigation`.
    pub fn parse(raw: &str, navigation: &Navigation) -> Option<Self> {
        let action = match raw.trim().to_lowercase().as_str() {
            "" => return Some(Self::default_for(navigation)),
            "p" | "prev" | "previous" => Action::Previous,
            "n" | "next" => Action::Next,
            "s" | "submit" => Action::Submit,
            "q" | "quit" | "exit" => Action::Quit,
            _ => return None,
        };
        let offered = match action {
            Action::Previous => navigation.previous,
            Action::Next => navigation.next,
            Action::Submit => navigation.submit,
            Action::Quit => true,
        };
        offered.then_some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Number;
    use survey_spec::QuestionType;

    fn middle_page() -> Navigation {
        Navigation {
            previous: true,
            next: true,
            submit: false,
        }
    }

    #[test]
    fn blank_action_moves_forward_then_submits() {
        assert_eq!(Action::parse("", &middle_page()), Some(Action::Next));
        let last = Navigation {
            previous: true,
            next: false,
            submit: true,
        };
        assert_eq!(Action::parse(" ", &last), Some(Action::Submit));
    }

    #[test]
    fn actions_not_offered_are_rejected() {
        assert_eq!(Action::parse("s", &middle_page()), None);
        assert_eq!(Action::parse("Previous", &middle_page()), Some(Action::Previous));
        assert_eq!(Action::parse("what", &middle_page()), None);
        assert_eq!(Action::parse("exit", &middle_page()), Some(Action::Quit));
    }

    #[test]
    fn prompt_shows_choices_and_current_value() {
        let control = RenderControl {
            id: "brand".into(),
            label: "Which brand?".into(),
            kind: QuestionType::Select,
            widget: Widget::SelectBox {
                options: vec!["Aucune".into(), "Marlboro".into()],
                index: Some(1),
            },
        };
        let prompt = PromptContext::new(&control);
        assert_eq!(prompt.hint.as_deref(), Some("(Aucune/Marlboro, or 1-2)"));
        assert_eq!(prompt.current, "Marlboro");

        let number = RenderControl {
            id: "age".into(),
            label: "Age".into(),
            kind: QuestionType::Number,
            widget: Widget::NumberInput {
                value: Number::from(0),
            },
        };
        assert_eq!(PromptContext::new(&number).current, "0");
    }
}
