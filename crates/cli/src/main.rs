// shiftgrid CLI - headless schedule editing

mod apply;
mod exit_codes;
mod feed;
mod script;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use shiftgrid_config::Settings;
use shiftgrid_engine::{BackendError, EngineError, MonthKey};

use exit_codes::{backend_exit_code, engine_exit_code, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "sgrid")]
#[command(about = "Shift schedule editor (headless)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides settings and SHIFTGRID_BACKEND_URL)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Settings file (default: <config dir>/shiftgrid/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an edit script over a month and print the pending changes
    #[command(after_help = "\
Exit codes:
  0  success
  1  error
  2  usage error or a script step was refused
  3  save rejected (conflict or validation), fully or partially
  4  backend unavailable; nothing was lost

Examples:
  sgrid apply --month-file april.json --script edits.toml
  sgrid apply --year 2025 --month 4 --script edits.toml --save --comment ajuste
  sgrid apply --month-file april.json --script edits.toml --save --offline --json")]
    Apply {
        /// Month data as JSON (skips fetching from the backend)
        #[arg(long)]
        month_file: Option<PathBuf>,

        /// Year to fetch when no --month-file is given
        #[arg(long)]
        year: Option<i32>,

        /// Month (1-12) to fetch when no --month-file is given
        #[arg(long)]
        month: Option<u32>,

        /// TOML edit script
        #[arg(long)]
        script: PathBuf,

        /// Submit the pending changes after replaying
        #[arg(long)]
        save: bool,

        /// Save against an in-memory copy of --month-file instead of the backend
        #[arg(long, requires = "save")]
        offline: bool,

        /// Save comment (overrides the script's comment)
        #[arg(long)]
        comment: Option<String>,

        /// Notification recipient (repeatable; default from settings)
        #[arg(long = "notify")]
        notify: Vec<String>,

        /// Print a single JSON object instead of text
        #[arg(long)]
        json: bool,
    },

    /// Follow the audit feed for a month, one JSON record per line
    Feed {
        #[arg(long)]
        year: i32,

        #[arg(long)]
        month: u32,

        /// Seconds between polls (default from settings)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many intervals
        #[arg(long)]
        polls: Option<u32>,
    },

    /// Print the days of a month with their weekday
    Days {
        #[arg(long)]
        year: i32,

        #[arg(long)]
        month: u32,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:   shiftgrid-engine ",
        env!("CARGO_PKG_VERSION"),
        "\nprotocol: v1",
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let result = load_settings(&cli).and_then(|settings| match cli.command {
        Commands::Apply { month_file, year, month, script, save, offline, comment, notify, json } => {
            apply::cmd_apply(
                apply::ApplyArgs { month_file, year, month, script, save, offline, comment, notify, json },
                &settings,
            )
        }
        Commands::Feed { year, month, interval, polls } => feed::cmd_feed(year, month, interval, polls, &settings),
        Commands::Days { year, month } => cmd_days(year, month),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(|e| CliError::args(e.to_string()))?
            .with_backend_override(std::env::var(shiftgrid_config::settings::BACKEND_URL_ENV).ok()),
        None => Settings::load(),
    };
    Ok(settings.with_backend_override(cli.backend.clone()))
}

fn cmd_days(year: i32, month: u32) -> Result<(), CliError> {
    let key = MonthKey::new(year, month).map_err(CliError::engine)?;
    for day in key.day_range() {
        let weekday = NaiveDate::from_ymd_opt(year, month, day)
            .map(|d| d.weekday().to_string())
            .unwrap_or_default();
        println!("{:>2} {}", day, weekday);
    }
    Ok(())
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn engine(err: EngineError) -> Self {
        let hint = match &err {
            EngineError::Transient(_) => Some("pending edits were kept; retry the save later".to_string()),
            EngineError::Conflict { .. } | EngineError::PartialFailure { .. } => {
                Some("rejected cells changed on the server; reload the month and reapply".to_string())
            }
            EngineError::NothingToSave => Some("the script left no pending changes".to_string()),
            EngineError::Backend(e) => backend_hint(e),
            _ => None,
        };
        let mut message = err.to_string();
        for rejection in err.rejections() {
            message.push_str(&format!("\n  {}", rejection));
        }
        Self { code: engine_exit_code(&err), message, hint }
    }

    pub fn backend(err: BackendError) -> Self {
        let hint = backend_hint(&err);
        Self { code: backend_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn with_context(mut self, context: impl AsRef<str>) -> Self {
        self.message = format!("{}: {}", context.as_ref(), self.message);
        self
    }
}

fn backend_hint(err: &BackendError) -> Option<String> {
    match err {
        BackendError::Unavailable(_) => Some("is the backend URL correct? see --backend".to_string()),
        BackendError::Http(401, _) | BackendError::Http(403, _) => {
            Some("set SHIFTGRID_TOKEN or store a token in the keychain".to_string())
        }
        _ => None,
    }
}
