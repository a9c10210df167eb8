//! CLI entry point for todo-sync.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use time::Date;
use time::macros::format_description;
use todo_sync_app::AppConfig;
use todo_sync_core::{MonthKey, TaskId};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;
mod view;

/// Personal to-do list synced with a hosted backend.
#[derive(Parser, Debug)]
#[command(name = "todo-sync", version, about = "todo-sync: personal tasks with monthly stats and a calendar")]
struct Cli {
    /// Config file (defaults to <config dir>/todo-sync/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Account email.
    #[arg(long, env = "TODO_SYNC_EMAIL", global = true)]
    email: Option<String>,

    /// Account password.
    #[arg(long, env = "TODO_SYNC_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Access token from an earlier session; used instead of email/password.
    #[arg(long, env = "TODO_SYNC_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new account with the configured credentials.
    Signup,

    /// List tasks, pending first.
    List {
        #[arg(long, value_enum, default_value_t = ListFormat::Text)]
        format: ListFormat,
    },

    /// Add a task.
    Add {
        /// Task text.
        text: String,
    },

    /// Flip a task between pending and done.
    Toggle {
        /// Task id.
        id: TaskId,
    },

    /// Replace a task's text.
    Edit {
        /// Task id.
        id: TaskId,
        /// New text.
        text: String,
    },

    /// Delete a task.
    Remove {
        /// Task id.
        id: TaskId,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Monthly completion dashboard.
    Stats {
        /// Number of recent months to show (defaults to display.dashboard_months).
        #[arg(long)]
        months: Option<usize>,
    },

    /// Today's tasks and completion.
    Today,

    /// Tasks created on a given day.
    Day {
        /// Day as YYYY-MM-DD.
        #[arg(value_parser = parse_day)]
        date: Date,
    },

    /// Month calendar with task markers.
    Calendar {
        /// Month as YYYY-MM (defaults to the current month).
        #[arg(long)]
        month: Option<MonthKey>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ListFormat {
    Text,
    Json,
}

fn parse_day(raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn main() -> Result<()> {
    let Cli {
        config,
        email,
        password,
        access_token,
        cmd,
    } = Cli::parse();

    install_tracing();

    let config = AppConfig::load(config.as_deref())?;
    // Read the local offset while the process is still single-threaded.
    let offset = config.display.utc_offset.resolve();
    let login = commands::Login {
        email,
        password,
        access_token,
    };

    tokio::runtime::Runtime::new()?.block_on(commands::run(cmd, &config, offset, login))
}

fn install_tracing() {
    // RUST_LOG overrides; INFO by default.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parse_add_command() {
        let cli = Cli::parse_from(["todo-sync", "--config", "/tmp/todo.toml", "add", "buy milk"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/todo.toml")));
        match cli.cmd {
            Command::Add { text } => assert_eq!(text, "buy milk"),
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn parse_edit_command() {
        let cli = Cli::parse_from(["todo-sync", "edit", "42", "walk the dog"]);
        match cli.cmd {
            Command::Edit { id, text } => {
                assert_eq!(id, TaskId(42));
                assert_eq!(text, "walk the dog");
            }
            _ => panic!("expected edit command"),
        }
    }

    #[test]
    fn remove_requires_explicit_flag_to_confirm() {
        let cli = Cli::parse_from(["todo-sync", "remove", "7"]);
        match cli.cmd {
            Command::Remove { id, yes } => {
                assert_eq!(id, TaskId(7));
                assert!(!yes);
            }
            _ => panic!("expected remove command"),
        }

        let cli = Cli::parse_from(["todo-sync", "remove", "7", "--yes"]);
        assert!(matches!(cli.cmd, Command::Remove { yes: true, .. }));
    }

    #[test]
    fn parse_day_and_calendar() {
        let cli = Cli::parse_from(["todo-sync", "day", "2024-01-05"]);
        match cli.cmd {
            Command::Day { date: day } => assert_eq!(day, date!(2024 - 01 - 05)),
            _ => panic!("expected day command"),
        }

        let cli = Cli::parse_from(["todo-sync", "calendar", "--month", "2024-02"]);
        match cli.cmd {
            Command::Calendar { month } => assert_eq!(month.map(|m| m.to_string()).as_deref(), Some("2024-02")),
            _ => panic!("expected calendar command"),
        }
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["todo-sync", "day", "05/01/2024"]).is_err());
        assert!(Cli::try_parse_from(["todo-sync", "toggle", "abc"]).is_err());
        assert!(Cli::try_parse_from(["todo-sync", "calendar", "--month", "2024-13"]).is_err());
    }

    #[test]
    fn parse_stats_and_list_format() {
        let cli = Cli::parse_from(["todo-sync", "stats", "--months", "3"]);
        assert!(matches!(cli.cmd, Command::Stats { months: Some(3) }));

        let cli = Cli::parse_from(["todo-sync", "list", "--format", "json"]);
        assert!(matches!(cli.cmd, Command::List { format: ListFormat::Json }));
    }
}
