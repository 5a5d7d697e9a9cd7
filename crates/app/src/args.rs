use std::fmt;
use std::path::PathBuf;

use quiz_core::model::MAX_COOLDOWN_SECS;
use services::gate::DEFAULT_COOLDOWN_SECS;

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidCooldown { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCooldown { raw } => {
                write!(
                    f,
                    "invalid --cooldown-secs value (expected 1..={MAX_COOLDOWN_SECS}): {raw}"
                )
            }
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Take,
    Status,
    Wait,
    Report,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "status" => Some(Self::Status),
            "wait" => Some(Self::Wait),
            "report" => Some(Self::Report),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Resolved command line, with environment fallbacks already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub command: Command,
    pub db_url: String,
    pub questions: Option<PathBuf>,
    pub cooldown_secs: i64,
    pub out: Option<PathBuf>,
    pub force: bool,
}

/// What the caller should do with the parsed command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    Run(Args),
    Help,
}

/// Environment lookups, injectable so parsing stays testable.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [take]   [--db <sqlite_url>] [--questions <file>] [--cooldown-secs <n>]");
    eprintln!("  app status   [--db <sqlite_url>]");
    eprintln!("  app wait     [--db <sqlite_url>]");
    eprintln!("  app report   [--db <sqlite_url>] [--out <file>]");
    eprintln!("  app reset    [--db <sqlite_url>] [--force]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --cooldown-secs {DEFAULT_COOLDOWN_SECS}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_QUESTIONS, QUIZ_COOLDOWN_SECS, RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_cooldown(raw: String) -> Result<i64, ArgsError> {
    match raw.trim().parse::<i64>() {
        Ok(secs) if (1..=MAX_COOLDOWN_SECS).contains(&secs) => Ok(secs),
        _ => Err(ArgsError::InvalidCooldown { raw }),
    }
}

/// Parse `argv` (without the program name).
///
/// With no subcommand, or when the first argument is a flag, `take` is assumed.
///
/// # Errors
///
/// Returns `ArgsError` for unknown commands/flags or malformed values.
pub fn parse(argv: Vec<String>, env: &dyn Env) -> Result<Parsed, ArgsError> {
    let mut iter = argv.into_iter().peekable();

    let first = iter.peek().cloned();
    let command = match first.as_deref() {
        None => Command::Take,
        Some("--help" | "-h" | "help") => return Ok(Parsed::Help),
        Some(flag) if flag.starts_with("--") => Command::Take,
        Some(name) => {
            let command = Command::from_arg(name)
                .ok_or_else(|| ArgsError::UnknownCommand(name.to_owned()))?;
            iter.next();
            command
        }
    };

    let mut db_url = normalize_sqlite_url(
        env.var("QUIZ_DB_URL")
            .unwrap_or_else(|| "sqlite:quiz.sqlite3".into()),
    );
    let mut questions = env.var("QUIZ_QUESTIONS").map(PathBuf::from);
    let mut cooldown_secs = match env.var("QUIZ_COOLDOWN_SECS") {
        Some(raw) => parse_cooldown(raw)?,
        None => DEFAULT_COOLDOWN_SECS,
    };
    let mut out = None;
    let mut force = false;

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(&mut iter, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                db_url = normalize_sqlite_url(value);
            }
            "--questions" => {
                questions = Some(PathBuf::from(require_value(&mut iter, "--questions")?));
            }
            "--cooldown-secs" => {
                cooldown_secs = parse_cooldown(require_value(&mut iter, "--cooldown-secs")?)?;
            }
            "--out" if command == Command::Report => {
                out = Some(PathBuf::from(require_value(&mut iter, "--out")?));
            }
            "--force" if command == Command::Reset => force = true,
            "--help" | "-h" => return Ok(Parsed::Help),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    Ok(Parsed::Run(Args {
        command,
        db_url,
        questions,
        cooldown_secs,
        out,
        force,
    }))
}

/// Turn `sqlite:relative.db` or a bare path into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: String) -> String {
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

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl Env for MapEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| (*v).to_owned())
        }
    }

    fn no_env() -> MapEnv {
        MapEnv(HashMap::new())
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| (*a).to_owned()).collect()
    }

    fn run(parsed: Parsed) -> Args {
        match parsed {
            Parsed::Run(args) => args,
            Parsed::Help => panic!("expected a command"),
        }
    }

    #[test]
    fn defaults_to_take() {
        let args = run(parse(Vec::new(), &no_env()).unwrap());
        assert_eq!(args.command, Command::Take);
        assert_eq!(args.cooldown_secs, DEFAULT_COOLDOWN_SECS);
        assert!(args.db_url.starts_with("sqlite://"));
        assert!(args.db_url.ends_with("quiz.sqlite3"));

        let args = run(parse(argv(&["--cooldown-secs", "60"]), &no_env()).unwrap());
        assert_eq!(args.command, Command::Take);
        assert_eq!(args.cooldown_secs, 60);
    }

    #[test]
    fn env_fallbacks_are_overridden_by_flags() {
        let env = MapEnv(HashMap::from([
            ("QUIZ_DB_URL", "sqlite:///tmp/env.db"),
            ("QUIZ_COOLDOWN_SECS", "30"),
            ("QUIZ_QUESTIONS", "/tmp/q.json"),
        ]));
        let args = run(parse(argv(&["status"]), &env).unwrap());
        assert_eq!(args.db_url, "sqlite:///tmp/env.db");
        assert_eq!(args.cooldown_secs, 30);
        assert_eq!(args.questions, Some(PathBuf::from("/tmp/q.json")));

        let args = run(parse(argv(&["status", "--db", "sqlite::memory:"]), &env).unwrap());
        assert_eq!(args.db_url, "sqlite::memory:");
    }

    #[test]
    fn command_specific_flags() {
        let args = run(parse(argv(&["report", "--out", "r.txt"]), &no_env()).unwrap());
        assert_eq!(args.out, Some(PathBuf::from("r.txt")));

        let args = run(parse(argv(&["reset", "--force"]), &no_env()).unwrap());
        assert!(args.force);

        assert_eq!(
            parse(argv(&["take", "--force"]), &no_env()),
            Err(ArgsError::UnknownArg("--force".into()))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse(argv(&["grade"]), &no_env()),
            Err(ArgsError::UnknownCommand("grade".into()))
        );
        assert_eq!(
            parse(argv(&["take", "--db"]), &no_env()),
            Err(ArgsError::MissingValue { flag: "--db" })
        );
        assert_eq!(
            parse(argv(&["take", "--cooldown-secs", "0"]), &no_env()),
            Err(ArgsError::InvalidCooldown { raw: "0".into() })
        );
        assert_eq!(
            parse(argv(&["take", "--cooldown-secs", "10000000000000"]), &no_env()),
            Err(ArgsError::InvalidCooldown {
                raw: "10000000000000".into()
            })
        );
        assert_eq!(parse(argv(&["--help"]), &no_env()), Ok(Parsed::Help));
    }

    #[test]
    fn normalizes_relative_paths() {
        let url = normalize_sqlite_url("sqlite:data/quiz.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.db"));
        assert_eq!(
            normalize_sqlite_url("sqlite:///abs.db".into()),
            "sqlite:///abs.db"
        );
    }
}
