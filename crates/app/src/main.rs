use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use quiz_core::model::{CooldownError, QuestionDraft, QuestionSet};
use quiz_core::time::format_duration;
use services::{
    AnswerUpdate, Clock, GateConfig, GateStatus, Navigation, Persistence, QuizSession,
    SessionError, SubmissionGate, TickOutcome,
};
use storage::{CooldownStore, Storage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod args;
mod terminal;

use args::{Args, ArgsError, Command, Parsed, ProcessEnv};
use terminal::{FilePrinter, StdoutPrinter, TerminalNotifier, render_question};

const BUILTIN_QUESTIONS: &str = include_str!("../assets/questions.json");

const EXAM_NOTICE: &str = "\
This is a timed exam. Work on your own and do not switch to other windows.
Once submitted, the quiz is locked until the cooldown ends.";

const TAKE_HELP: &str = "\
Commands: <n> select option n, [enter]/n next, p previous, g <n> go to question,
          s submit, q quit without submitting";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn load_questions(path: Option<&Path>) -> Result<QuestionSet, Box<dyn std::error::Error>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => BUILTIN_QUESTIONS.to_owned(),
    };
    let drafts: Vec<QuestionDraft> = serde_json::from_str(&raw)?;
    Ok(QuestionSet::new(drafts)?)
}

fn cooldown_config(secs: i64) -> Result<GateConfig, CooldownError> {
    let cooldown = Duration::try_seconds(secs).ok_or(CooldownError::OutOfRange)?;
    GateConfig::new(cooldown)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = match args::parse(argv, &ProcessEnv) {
        Ok(Parsed::Run(parsed)) => parsed,
        Ok(Parsed::Help) => {
            args::print_usage();
            return Ok(());
        }
        Err(err) => {
            eprintln!("{err}");
            args::print_usage();
            return Err(err.into());
        }
    };

    let questions = Arc::new(load_questions(parsed.questions.as_deref())?);

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    let config = cooldown_config(parsed.cooldown_secs)?.with_locked_reset(parsed.force);
    let gate = SubmissionGate::new(
        Clock::default_clock(),
        config,
        CooldownStore::new(Arc::clone(&storage.kv)),
    );
    let mut session = QuizSession::new(questions, gate, Arc::new(TerminalNotifier));
    let status = session.load().await;

    match parsed.command {
        Command::Take => take(&mut session, status).await,
        Command::Status => {
            print_status(&session, status);
            Ok(())
        }
        Command::Wait => wait(&mut session).await,
        Command::Report => report(&session, &parsed),
        Command::Reset => {
            if session.reset().await? == Persistence::Unavailable {
                eprintln!("The stored submission could not be cleared and may return next run.");
            } else {
                println!("Stored submission cleared.");
            }
            Ok(())
        }
    }
}

fn print_status(session: &QuizSession, status: GateStatus) {
    match status {
        GateStatus::Locked { remaining } => {
            println!("Locked: you can retake the quiz in {}.", format_duration(remaining));
            if let Some(card) = session.score_card() {
                println!(
                    "Last submission: {}/{} ({}%, grade {}).",
                    card.score, card.total, card.percentage, card.grade
                );
            }
        }
        GateStatus::Idle | GateStatus::InProgress => {
            println!("Open: {} questions are ready.", session.questions().len());
        }
    }
}

async fn wait(session: &mut QuizSession) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        interval.tick().await;
        match session.tick().await {
            TickOutcome::Open => {
                println!("No cooldown is active.");
                return Ok(());
            }
            TickOutcome::Locked { remaining } => {
                println!("Retake available in {}", format_duration(remaining));
            }
            TickOutcome::Unlocked => return Ok(()),
        }
    }
}

fn report(session: &QuizSession, parsed: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let result = match &parsed.out {
        Some(path) => session.print_report(&FilePrinter::new(path)),
        None => session.print_report(&StdoutPrinter),
    };
    result?;
    if let Some(path) = &parsed.out {
        println!("Report written to {}.", path.display());
    }
    Ok(())
}

async fn take(
    session: &mut QuizSession,
    status: GateStatus,
) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(status, GateStatus::Locked { .. }) {
        print_status(session, status);
        println!("Run `app report` to review your submitted answers.");
        return Ok(());
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("{EXAM_NOTICE}");
    println!("Press enter to begin.");
    if input.next_line().await?.is_none() {
        return Ok(());
    }
    session.acknowledge_notice().await?;
    println!("{TAKE_HELP}");

    loop {
        show_current(session);
        let Some(line) = input.next_line().await? else {
            session.abandon();
            println!("Input closed; the attempt was not submitted.");
            return Ok(());
        };

        match take_step(session, line.trim()).await {
            Ok(Step::Continue) => {}
            Ok(Step::Done) => return Ok(()),
            Err(SessionError::OutOfRangeNavigation(err)) => println!("{err}"),
            Err(err) => return Err(err.into()),
        }
    }
}

enum Step {
    Continue,
    Done,
}

async fn take_step(session: &mut QuizSession, line: &str) -> Result<Step, SessionError> {
    match line {
        "" | "n" => {
            if let Navigation::Finished(_) = session.advance().await? {
                print_submitted(session);
                return Ok(Step::Done);
            }
        }
        "p" => {
            session.retreat()?;
        }
        "s" => {
            session.finish().await?;
            print_submitted(session);
            return Ok(Step::Done);
        }
        "q" => {
            session.abandon();
            println!("Attempt abandoned.");
            return Ok(Step::Done);
        }
        other => {
            if let Some(target) = other.strip_prefix("g ") {
                match target.trim().parse::<usize>() {
                    Ok(number) if number > 0 => {
                        session.go_to(number - 1)?;
                    }
                    _ => println!("Usage: g <question number>"),
                }
            } else {
                match other.parse::<usize>() {
                    Ok(number) if number > 0 => {
                        if session.answer_current(number - 1)? == AnswerUpdate::Ignored {
                            println!("The attempt is already submitted.");
                        }
                    }
                    _ => println!("{TAKE_HELP}"),
                }
            }
        }
    }
    Ok(Step::Continue)
}

fn show_current(session: &QuizSession) {
    if let (Some(question), Some(attempt)) = (session.current_question(), session.attempt()) {
        print!("{}", render_question(question, attempt));
    }
}

fn print_submitted(session: &QuizSession) {
    if let Some(report) = session.report() {
        println!();
        print!("{report}");
    }
    if let GateStatus::Locked { remaining } = session.gate().status() {
        println!("Next attempt available in {}.", format_duration(remaining));
    }
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

    let path = Path::new(path);
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

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_questions_are_valid() {
        let questions = load_questions(None).unwrap();
        assert!(!questions.is_empty());
    }

    #[test]
    fn prepare_rejects_non_file_urls() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
        assert!(prepare_sqlite_file("postgres://localhost/db").is_err());
    }

    #[test]
    fn cooldown_config_rejects_unrepresentable_windows() {
        assert_eq!(
            cooldown_config(60).unwrap().cooldown(),
            Duration::seconds(60)
        );
        assert_eq!(cooldown_config(i64::MAX), Err(CooldownError::OutOfRange));
        assert_eq!(
            cooldown_config(10_000_000_000_000),
            Err(CooldownError::OutOfRange)
        );
    }

    #[tokio::test]
    async fn scripted_attempt_submits_on_last_advance() {
        let questions = Arc::new(load_questions(None).unwrap());
        let count = questions.len();
        let gate = SubmissionGate::new(
            Clock::fixed(quiz_core::time::fixed_now()),
            GateConfig::default(),
            CooldownStore::new(Arc::clone(&Storage::in_memory().kv)),
        );
        let mut session = QuizSession::new(questions, gate, Arc::new(services::NullNotifier));
        session.acknowledge_notice().await.unwrap();

        assert!(matches!(take_step(&mut session, "1").await, Ok(Step::Continue)));
        assert!(matches!(
            take_step(&mut session, "g 99").await,
            Err(SessionError::OutOfRangeNavigation(_))
        ));
        for _ in 1..count {
            assert!(matches!(take_step(&mut session, "n").await, Ok(Step::Continue)));
        }
        assert!(matches!(take_step(&mut session, "").await, Ok(Step::Done)));
        assert!(session.gate().is_locked());
        assert_eq!(session.attempt().unwrap().answered_count(), 1);
    }
}
