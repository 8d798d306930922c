use anyhow::Result;
use clap::{Parser, Subcommand};
use sitewright::config::Config;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "sitewright")]
#[command(version, about = "AI-assisted website generation orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to sitewright.toml. Defaults to ./sitewright.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session storage directory. Overrides config and environment.
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new generation session from a prompt
    Start {
        /// The natural-language site description
        prompt: String,
        /// Industry label; omit to detect from the prompt
        #[arg(long)]
        industry: Option<String>,
        /// Pages to generate (repeatable)
        #[arg(long = "page")]
        pages: Option<Vec<String>>,
        /// Visual style label
        #[arg(long)]
        style: Option<String>,
    },
    /// Show a session's phase, status, and stats
    Status { id: String },
    /// Show a session's build step list and cursor
    Steps { id: String },
    /// Accept the mockup and enter the build phase
    Accept { id: String },
    /// Delete a session
    Cancel { id: String },
    /// List sessions on disk
    List,
    /// Purge expired sessions
    Reap,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let mut config = Config::resolve(cli.config.as_deref(), cli.verbose)?;
    if let Some(dir) = cli.session_dir {
        config.session_dir = dir;
    }
    config.ensure_directories()?;

    match cli.command {
        Commands::Start {
            prompt,
            industry,
            pages,
            style,
        } => cmd::cmd_start(&config, &prompt, industry, pages, style),
        Commands::Status { id } => cmd::cmd_status(&config, &id),
        Commands::Steps { id } => cmd::cmd_steps(&config, &id),
        Commands::Accept { id } => cmd::cmd_accept(&config, &id),
        Commands::Cancel { id } => cmd::cmd_cancel(&config, &id),
        Commands::List => cmd::cmd_list(&config),
        Commands::Reap => cmd::cmd_reap(&config),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "sitewright=debug" } else { "sitewright=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
