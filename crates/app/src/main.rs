use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use quiz_core::model::{EngineSettings, QuizId, UserId};
use quiz_core::time::format_remaining;
use services::memory::ManualSignalSource;
use services::{
    AppServices, AttemptResult, Clock, Collaborators, DetectorOutcome, ExitResponse, ExitSignal,
    FinalizeOutcome, FinalizeTrigger, JsonDefinitionProvider, Notifier, ProgressRecorder,
    ProviderError, Router, SessionManager, SessionState, Severity, TimerEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod input;

use input::{HELP, Input};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz-runner take [<slug>] [--db <sqlite_url>] [--user <id>] [--definitions <path>]");
    eprintln!("  quiz-runner list [--definitions <path>]");
    eprintln!();
    eprintln!("Without a slug, `take` resumes the quiz you have in progress.");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --user 1");
    eprintln!("  --definitions quizzes");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_ID, QUIZ_DEFINITIONS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    List,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user_id: UserId,
    definitions: PathBuf,
    slug: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL").map_or_else(
            |_| normalize_sqlite_url("sqlite:quiz.sqlite3".into()),
            normalize_sqlite_url,
        );
        let mut user_id = std::env::var("QUIZ_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or(UserId::new(1));
        let mut definitions = std::env::var("QUIZ_DEFINITIONS")
            .map_or_else(|_| PathBuf::from("quizzes"), PathBuf::from);
        let mut slug = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--definitions" => {
                    definitions = PathBuf::from(require_value(args, "--definitions")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if !arg.starts_with("--") && slug.is_none() => slug = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            definitions,
            slug,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

// ─── Terminal collaborators ────────────────────────────────────────────────────

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => println!("{message}"),
            Severity::Warning => println!("! {message}"),
            Severity::Error => eprintln!("error: {message}"),
        }
    }
}

/// Remembers the last route; the runner has a single "page".
#[derive(Default)]
struct TerminalRouter {
    last: Mutex<Option<String>>,
}

impl TerminalRouter {
    fn take(&self) -> Option<String> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl Router for TerminalRouter {
    fn navigate_to(&self, path: &str) {
        tracing::debug!(path, "navigate");
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
    }
}

struct LoggedProgress;

#[async_trait]
impl ProgressRecorder for LoggedProgress {
    async fn mark_complete(&self, user_id: UserId, quiz_id: QuizId) -> Result<(), ProviderError> {
        tracing::info!(user_id = %user_id, quiz_id = %quiz_id, "quiz marked complete");
        Ok(())
    }
}

// ─── Session loop ──────────────────────────────────────────────────────────────

fn print_question(manager: &SessionManager) {
    let (Some(question), Some(progress), Some(session)) = (
        manager.current_question(),
        manager.progress(),
        manager.session(),
    ) else {
        return;
    };

    println!();
    println!(
        "Question {}/{} (id {})  answered {}/{}  time left {}",
        progress.current_index + 1,
        progress.total,
        question.id(),
        progress.answered,
        progress.total,
        format_remaining(manager.remaining_secs().unwrap_or(0)),
    );
    println!("  {}", question.prompt());
    let selected = session.answer_for(question.id());
    for option in question.options() {
        let marker = if selected == Some(option.id) { '*' } else { ' ' };
        println!("  {marker} [{}] {}", option.id, option.label);
    }
}

fn print_result(result: &AttemptResult) {
    let score = &result.score;
    println!();
    if result.trigger == FinalizeTrigger::Expiry {
        println!("Time is up.");
    }
    println!(
        "Score: {}/{} ({}%)  {}",
        score.correct_count,
        score.total_questions,
        score.percentage,
        if score.passed { "PASSED" } else { "not passed" }
    );
    println!("Type `retry` to try again or `quit` to leave.");
}

fn show_tick(remaining_secs: u32) -> bool {
    remaining_secs <= 10 || remaining_secs % 60 == 0
}

/// Drives the attempt from stdin and the countdown until the learner quits.
async fn session_loop(
    manager: &mut SessionManager,
    signals: &ManualSignalSource,
    router: &TerminalRouter,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirm_exit = false;

    print_question(manager);
    loop {
        let timer_running = manager.state() == SessionState::Active;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    manager.cancel();
                    break;
                };
                confirm_exit = false;
                match input::parse(&line) {
                    Ok(Input::Quit) => {
                        if manager.state() == SessionState::Cleared {
                            manager.acknowledge_result();
                        } else {
                            manager.cancel();
                            println!("Your progress is saved. Run `quiz-runner take` to resume.");
                        }
                        break;
                    }
                    Ok(input) => handle_input(manager, input).await,
                    Err(err) => println!("{err}"),
                }
            }
            event = manager.wait_timer_event(), if timer_running => {
                let Some(event) = event else { continue };
                match manager.handle_timer_event(event).await {
                    TimerEvent::Tick { remaining_secs } if show_tick(remaining_secs) => {
                        println!("  {} left", format_remaining(remaining_secs));
                    }
                    TimerEvent::Expired(FinalizeOutcome::Completed(result)) => print_result(&result),
                    _ => {}
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if confirm_exit || manager.state() != SessionState::Active {
                    manager.cancel();
                    break;
                }
                if signals.emit(ExitSignal::Unload) == Some(ExitResponse::Confirm) {
                    println!("! A quiz is in progress. Press Ctrl-C again to leave; it can be resumed later.");
                    confirm_exit = true;
                }
            }
        }
    }

    if let Some(path) = router.take() {
        println!("-> {path}");
    }
    Ok(())
}

async fn handle_input(manager: &mut SessionManager, input: Input) {
    let outcome = match input {
        Input::Answer { question, option } => manager
            .record_answer(question, option)
            .await
            .map(|()| print_question(manager)),
        Input::Next => manager.advance().await.map(|_| print_question(manager)),
        Input::Prev => manager.retreat().await.map(|_| print_question(manager)),
        Input::Show => {
            print_question(manager);
            Ok(())
        }
        Input::Submit => manager.finalize(FinalizeTrigger::Manual).await.map(|outcome| {
            if let FinalizeOutcome::Completed(result) = outcome {
                print_result(&result);
            }
        }),
        Input::Retry => manager.retry().await.map(|_| print_question(manager)),
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::Quit => Ok(()),
    };
    if let Err(err) = outcome {
        println!("{err}");
    }
}

// ─── Entry ─────────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Take,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).unwrap_or(Command::Take),
    };
    if argv
        .first()
        .is_some_and(|first| Command::from_arg(first).is_some())
    {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let definitions = Arc::new(JsonDefinitionProvider::from_path(&args.definitions).await?);
    if cmd == Command::List {
        for slug in definitions.slugs() {
            println!("{slug}");
        }
        return Ok(());
    }

    prepare_sqlite_file(&args.db_url)?;
    let router = Arc::new(TerminalRouter::default());
    let signals = Arc::new(ManualSignalSource::new());
    let services = AppServices::new_sqlite(
        &args.db_url,
        Clock::default_clock(),
        EngineSettings::default(),
        Collaborators {
            definitions,
            progress: Arc::new(LoggedProgress),
            notifier: Arc::new(TerminalNotifier),
            router: router.clone(),
            signals: signals.clone(),
        },
    )
    .await?;

    let slug = match services.detector().check(args.user_id).await {
        DetectorOutcome::Redirected { path, .. } => {
            router.take();
            path.rsplit('/').next().map(str::to_string)
        }
        DetectorOutcome::NoSession | DetectorOutcome::Discarded => args.slug,
    };
    let Some(slug) = slug else {
        println!("No quiz in progress. Pick one with `quiz-runner take <slug>` (see `quiz-runner list`).");
        return Ok(());
    };

    let mut manager = services.session_manager();
    manager.start(args.user_id, &slug).await?;
    println!("{HELP}");
    session_loop(&mut manager, &signals, &router).await
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
