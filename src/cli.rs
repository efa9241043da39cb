//! CLI argument parsing for the screening workflow.
//!
//! Every subcommand talks to one engine process for one project. Engine and
//! project settings resolve in priority order:
//! 1. command-line flag
//! 2. config file
//! 3. environment (engine command only)
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "screenflow",
    version,
    about = "Pipeline status and screening decisions for a literature review engine",
    after_help = "Examples:\n  screenflow --project review --base-path ~/reviews status\n  screenflow prescreen --limit 20 --enrich-ahead 3\n  screenflow screen\n  screenflow edit-screen --toggle smith2020 --toggle lee2019\n  screenflow init-config",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: platform config dir, screenflow/config.json)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Shell command that starts the engine's JSON-RPC server
    #[arg(long, value_name = "CMD", global = true)]
    pub engine: Option<String>,

    /// Project id passed with every engine call
    #[arg(long, value_name = "ID", global = true)]
    pub project: Option<String>,

    /// Directory holding the project
    #[arg(long, value_name = "DIR", global = true)]
    pub base_path: Option<PathBuf>,

    /// Log engine traffic at debug level
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the engine answers
    Ping,
    Status(StatusArgs),
    Info(InfoArgs),
    Prescreen(PrescreenArgs),
    Screen(ScreenArgs),
    EditScreen(EditScreenArgs),
    Enrich(EnrichArgs),
    InitConfig(InitConfigArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Show derived stage statuses and the next operation")]
pub struct StatusArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Show the engine's preconditions for one operation")]
pub struct InfoArgs {
    /// Operation name, e.g. search, prep, screen
    #[arg(value_name = "OPERATION")]
    pub operation: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Review title/abstract records one at a time")]
pub struct PrescreenArgs {
    /// Maximum records to load (default: queue_limit from config)
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Enrich this many upcoming records after each decision
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub enrich_ahead: usize,
}

#[derive(Parser, Debug)]
#[command(about = "Review full texts against the screening criteria")]
pub struct ScreenArgs {
    /// Maximum records to load (default: queue_limit from config)
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(about = "Flip finished full-text decisions in one batch")]
pub struct EditScreenArgs {
    /// Record id to flip; repeat for several records
    #[arg(long, value_name = "ID", required = true)]
    pub toggle: Vec<String>,

    /// Print the batch without saving it
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Ask the engine to enrich record metadata")]
pub struct EnrichArgs {
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Write a default config file")]
pub struct InitConfigArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
