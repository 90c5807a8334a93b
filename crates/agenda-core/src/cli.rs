use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "agenda",
    version,
    about = "Agenda: recurring tasks with overdue-aware lists",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "agendarc", global = true)]
    pub agendarc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task, or the anchor of a recurring series.
    Add(AddArgs),
    /// Show the filtered list, overdue tasks first.
    List(ViewArgs),
    /// Show every field of one task.
    Info { id: String },
    /// Edit fields of one task.
    Modify(ModifyArgs),
    /// Flip a task between pending and completed.
    Toggle { id: String },
    /// Set the status of a task.
    Status { id: String, status: String },
    /// Delete tasks by id, or everything in the filtered view with --all.
    Delete(DeleteArgs),
    /// Regenerate the open occurrences of a series anchor.
    Expand { id: String },
    /// Print the filtered list as JSON.
    Export(ViewArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    #[arg(long, default_value = "all")]
    pub status: String,

    #[arg(long, default_value = "all")]
    pub priority: String,

    #[arg(long, short = 's', default_value = "")]
    pub search: String,
}

#[derive(Args, Debug, Clone)]
pub struct RecurArgs {
    /// daily, weekly, monthly or yearly.
    #[arg(long)]
    pub recur: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub every: Option<i64>,

    #[arg(long)]
    pub until: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(long, default_value = "today")]
    pub due: String,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[command(flatten)]
    pub recurrence: RecurArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ModifyArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[command(flatten)]
    pub recurrence: RecurArgs,

    #[arg(long, conflicts_with = "recur")]
    pub no_recur: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub ids: Vec<String>,

    #[arg(long, conflicts_with = "ids")]
    pub all: bool,

    #[command(flatten)]
    pub view: ViewArgs,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
