#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use ticketry_core::config::{self, TicketryConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tk: support tickets with an audit trail",
    long_about = None
)]
struct Cli {
    /// Database file (overrides TICKETRY_DB and the config file).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (overrides TICKETRY_CONFIG).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Register accounts, groups, and ticket types",
        after_help = "EXAMPLES:\n    tk ref account acct-amir amir --name \"Amir Haddad\"\n    tk ref group grp-it \"IT Support\" --member acct-amir\n    tk ref type type-issue Issue"
    )]
    Ref(cmd::refs::RefArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Open a new ticket",
        after_help = "EXAMPLES:\n    tk create --owner acct-olive --group grp-it --type type-issue \\\n        --subject \"VPN drops\" --issue \"Disconnects every hour\" --tag vpn"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Set a ticket's status",
        after_help = "EXAMPLES:\n    tk status 12 open\n    tk status 12 3"
    )]
    Status(cmd::update::StatusArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Assign or unassign a ticket",
        after_help = "EXAMPLES:\n    tk assign 12 acct-amir\n    tk assign 12 --clear"
    )]
    Assign(cmd::update::AssignArgs),

    #[command(next_help_heading = "Lifecycle", about = "Set a ticket's priority")]
    Priority(cmd::update::PriorityArgs),

    #[command(next_help_heading = "Lifecycle", about = "Move a ticket to another group")]
    Group(cmd::update::GroupArgs),

    #[command(next_help_heading = "Lifecycle", about = "Change a ticket's type")]
    Type(cmd::update::TypeArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Add a comment to a ticket",
        after_help = "EXAMPLES:\n    tk comment 12 --owner acct-amir --body \"Replaced the router\""
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(next_help_heading = "Lifecycle", about = "Remove a comment from a ticket")]
    Uncomment(cmd::comment::UncommentArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Soft-delete a ticket",
        after_help = "EXAMPLES:\n    tk delete tk-0a1b2c3d4e5f"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Read",
        about = "List tickets",
        after_help = "EXAMPLES:\n    tk list\n    tk list --group grp-it --group grp-hr --status open\n    tk list --assignee acct-amir --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one ticket",
        after_help = "EXAMPLES:\n    tk show '#12'\n    tk show tk-0a1b2c3d4e5f --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(next_help_heading = "Read", about = "Show a ticket's comments")]
    Comments(cmd::comment::CommentsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Reporting counts and dashboard",
        after_help = "EXAMPLES:\n    tk stats\n    tk stats --year 2025 --month 6 --status closed\n    tk stats --day-ending 2026-04-15T12:00:00Z"
    )]
    Stats(cmd::stats::StatsArgs),
}

/// Initialize tracing on stderr.
///
/// `TICKETRY_LOG` takes an `EnvFilter` directive; `TICKETRY_LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TICKETRY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tk=debug,ticketry_core=debug,info"
        } else {
            "tk=info,ticketry_core=info,warn"
        })
    });
    let format = env::var("TICKETRY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// `--config`, then `TICKETRY_CONFIG`, then the user config dir.
fn resolve_config(flag: Option<&Path>) -> anyhow::Result<TicketryConfig> {
    if let Some(path) = flag {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return config::load_config(path);
    }
    match env::var_os("TICKETRY_CONFIG")
        .map(PathBuf::from)
        .or_else(config::default_config_path)
    {
        Some(path) => config::load_config(&path),
        None => Ok(TicketryConfig::default()),
    }
}

/// `--db`, then `TICKETRY_DB`, then `store.path` from config.
fn resolve_db(flag: Option<PathBuf>, config: &TicketryConfig) -> PathBuf {
    flag.or_else(|| env::var_os("TICKETRY_DB").map(PathBuf::from))
        .unwrap_or_else(|| config.store.path.clone())
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    let db = resolve_db(cli.db, &config);
    let session = cmd::Session::open(&db, &config)?;

    match cli.command {
        Commands::Ref(args) => cmd::refs::run_ref(args, &session, output),
        Commands::Create(args) => cmd::create::run_create(args, &session, output),
        Commands::Status(args) => cmd::update::run_status(&args, &session, output),
        Commands::Assign(args) => cmd::update::run_assign(&args, &session, output),
        Commands::Priority(args) => cmd::update::run_priority(&args, &session, output),
        Commands::Group(args) => cmd::update::run_group(&args, &session, output),
        Commands::Type(args) => cmd::update::run_type(&args, &session, output),
        Commands::Comment(args) => cmd::comment::run_comment(&args, &session, output),
        Commands::Uncomment(args) => cmd::comment::run_uncomment(&args, &session, output),
        Commands::Delete(args) => cmd::delete::run_delete(&args, &session, output),
        Commands::List(args) => cmd::list::run_list(&args, &session, output),
        Commands::Show(args) => cmd::show::run_show(&args, &session, output),
        Commands::Comments(args) => cmd::comment::run_comments(&args, &session, output),
        Commands::Stats(args) => cmd::stats::run_stats(&args, &session, output),
    }
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let output = resolve_output_mode(cli.json);

    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "command failed");
            if render_error(output, &CliError::from_anyhow(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
