mod logging;
mod wizard;

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use survey_engine::{EngineError, Questionnaire, SessionId, SubmitError};
use survey_sink::{CsvSheet, GoogleSheet, ServiceAccountKey, SheetBackend};
use survey_spec::{
    AnswerSet, Catalog, CatalogCache, RenderPayload, SessionState, catalog_row_schema,
    render_json_ui, render_text,
};
use tracing::{error, info};
use wizard::{Action, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    name = "survey",
    author,
    version,
    about = "Paged questionnaire with conditional questions",
    long_about = "Runs a paged questionnaire loaded from a spreadsheet in the terminal and appends \
                  each completed response to a Google spreadsheet or a local CSV file. A run \
                  collects one response unless --repeat is given."
)]
struct Cli {
    /// Question catalog (.xlsx, .xls, .ods or .csv).
    #[arg(
        long,
        global = true,
        env = "SURVEY_CATALOG",
        default_value = "questions.xlsx",
        value_name = "FILE"
    )]
    catalog: PathBuf,
    /// Increase log detail on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(flatten)]
    destination: DestinationArgs,
    /// Print the answers collected so far after each page.
    #[arg(long)]
    answers_json: bool,
    /// After each submission, start over on page 1 for the next respondent.
    #[arg(long)]
    repeat: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct DestinationArgs {
    /// Name of the Google spreadsheet that receives responses.
    #[arg(
        long,
        env = "SURVEY_SHEET_NAME",
        default_value = "Questionnaire_Responses",
        value_name = "NAME"
    )]
    sheet_name: String,
    /// Service-account key JSON, usually injected as a secret.
    #[arg(
        long,
        env = "SURVEY_CREDENTIALS_JSON",
        hide_env_values = true,
        value_name = "JSON"
    )]
    credentials_json: Option<String>,
    /// Service-account key file, used when no inline key is given.
    #[arg(
        long,
        env = "SURVEY_CREDENTIALS_FILE",
        default_value = "service_account.json",
        value_name = "FILE"
    )]
    credentials_file: PathBuf,
    /// Append responses to this CSV file instead of Google Sheets.
    #[arg(long, env = "SURVEY_CSV_OUTPUT", value_name = "FILE")]
    csv_output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Answer the questionnaire interactively (the default).
    Run,
    /// Render one page for a set of answers without prompting.
    Render {
        /// JSON object of answers keyed by question id.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// 1-based page position.
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Load the catalog and report condition problems.
    Check,
    /// Print the JSON schema of one catalog row.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    run(cli).inspect_err(|err| error!("{err}"))
}

fn run(cli: Cli) -> CliResult<()> {
    match &cli.command {
        None | Some(Command::Run) => run_wizard(&cli),
        Some(Command::Render {
            answers,
            page,
            format,
        }) => run_render(&cli.catalog, answers.as_deref(), *page, *format),
        Some(Command::Check) => run_check(&cli.catalog),
        Some(Command::Schema) => {
            println!("{}", serde_json::to_string_pretty(&catalog_row_schema())?);
            Ok(())
        }
    }
}

fn load_catalog(path: &Path) -> CliResult<Arc<Catalog>> {
    let cache = CatalogCache::new();
    Ok(cache.get_or_load(path)?)
}

/// Opens the configured destination; any failure here stops the program.
fn open_destination(args: &DestinationArgs) -> CliResult<Box<dyn SheetBackend>> {
    if let Some(path) = &args.csv_output {
        let sheet = CsvSheet::open(path)?;
        info!(destination = %sheet.describe(), "writing responses locally");
        return Ok(Box::new(sheet));
    }

    let key = match &args.credentials_json {
        Some(json) if !json.trim().is_empty() => ServiceAccountKey::from_json(json)?,
        _ => ServiceAccountKey::from_file(&args.credentials_file)?,
    };
    let sheet = GoogleSheet::open(key, &args.sheet_name)?;
    Ok(Box::new(sheet))
}

fn run_wizard(cli: &Cli) -> CliResult<()> {
    let catalog = load_catalog(&cli.catalog)?;
    let sink = open_destination(&cli.destination)?;
    let presenter =
        WizardPresenter::new(Verbosity::from_verbose(cli.verbose > 0), cli.answers_json);

    let mut survey = Questionnaire::new(catalog);
    let id = survey.start();

    loop {
        let payload = fill_page(&mut survey, &id, &presenter)?;
        presenter.show_answers(&payload);

        match prompt_action(&payload, &presenter)? {
            Action::Previous => {
                survey.previous_page(&id)?;
            }
            Action::Next => {
                survey.next_page(&id)?;
            }
            Action::Submit => match survey.submit(&id, sink.as_ref()) {
                Ok(row) => {
                    presenter.show_submitted(&row);
                    if !cli.repeat {
                        return Ok(());
                    }
                    // The engine has already reset the session to page 1.
                    println!("Starting a new response.");
                }
                Err(SubmitError::Sink(err)) => presenter.show_submit_error(&err),
                Err(other) => return Err(other.into()),
            },
            Action::Quit => {
                println!("Leaving without submitting.");
                return Ok(());
            }
        }
    }
}

/// Prompts for every control on the current page.
///
/// The page is rendered again after each answer, so questions whose condition was just
/// satisfied are asked too.
fn fill_page(
    survey: &mut Questionnaire,
    id: &SessionId,
    presenter: &WizardPresenter,
) -> CliResult<RenderPayload> {
    let mut asked: HashSet<String> = HashSet::new();
    let mut header_shown = false;
    loop {
        let payload = survey.render(id)?;
        if !header_shown {
            presenter.show_page(&payload);
            header_shown = true;
        }
        let pending = payload
            .controls
            .iter()
            .find(|control| !asked.contains(&control.id))
            .cloned();
        let Some(control) = pending else {
            return Ok(payload);
        };
        asked.insert(control.id.clone());

        let prompt = PromptContext::new(&control);
        loop {
            presenter.show_prompt(&prompt);
            let input = read_input()?;
            if input.trim().is_empty() {
                break;
            }
            match survey.answer(id, &control.id, input.trim()) {
                Ok(_) => break,
                Err(EngineError::Input { source, .. }) => presenter.show_input_error(&source),
                Err(other) => return Err(other.into()),
            }
        }
    }
}

fn prompt_action(payload: &RenderPayload, presenter: &WizardPresenter) -> CliResult<Action> {
    loop {
        presenter.show_actions(&payload.navigation);
        let input = read_input()?;
        match Action::parse(&input, &payload.navigation) {
            Some(action) => return Ok(action),
            None => eprintln!("Unknown action '{}'.", input.trim()),
        }
    }
}

fn read_input() -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err("input closed before the questionnaire was submitted".into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn run_render(
    catalog_path: &Path,
    answers_path: Option<&Path>,
    page: usize,
    format: RenderMode,
) -> CliResult<()> {
    let catalog = load_catalog(catalog_path)?;
    let answers = match answers_path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            AnswerSet::from_json(serde_json::from_str(&contents)?)
                .ok_or("answers file must contain a JSON object")?
        }
        None => AnswerSet::new(),
    };

    let mut survey = Questionnaire::new(catalog);
    let id = survey.resume(SessionState {
        current_page: page,
        answers,
    });
    let payload = survey.render(&id)?;
    match format {
        RenderMode::Text => println!("{}", render_text(&payload, true)),
        RenderMode::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render_json_ui(&payload))?
        ),
    }
    Ok(())
}

fn run_check(catalog_path: &Path) -> CliResult<()> {
    let catalog = load_catalog(catalog_path)?;
    println!(
        "{}: {} questions on {} pages",
        catalog_path.display(),
        catalog.len(),
        catalog.total_pages()
    );
    for (position, (page, questions)) in catalog.by_page().iter().enumerate() {
        let ids: Vec<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        println!("Page {} (page value {}): {}", position + 1, page, ids.join(", "));
    }
    for question in catalog.questions().iter().filter(|q| !q.kind.is_known()) {
        println!("Unknown type '{}' for {}; it will be skipped", question.kind, question.id);
    }

    let issues = catalog.check_conditions();
    if issues.is_empty() {
        println!("All conditions parse.");
        return Ok(());
    }
    for issue in &issues {
        println!("Condition problem: {}", issue);
    }
    Err(format!("{} condition problem(s) found", issues.len()).into())
}
