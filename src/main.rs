use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shellmate::ai_providers::AiProviderFactory;
use shellmate::config::Config;
use shellmate::session_log::{CommandLog, FileCommandLog, NullCommandLog};
use shellmate::{environment, Conversation, RustylineReader, Shell, ShellOptions, ToolExecutor};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shellmate")]
#[command(about = "An AI companion for the terminal that proposes shell commands and runs the ones you approve")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to ./shellmate.toml, then the user config directory)
    #[arg(short = 'C', long = "config", global = true)]
    config_file: Option<PathBuf>,

    /// AI backend: gemini, openai or ollama
    #[arg(short, long)]
    provider: Option<String>,

    /// Model name for the selected backend
    #[arg(short, long)]
    model: Option<String>,

    /// Directory for the command log
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Per-command timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    InitConfig {
        /// Where to write it (defaults to the user config directory)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::InitConfig { path }) = cli.command {
        let path = path.unwrap_or_else(Config::default_path);
        Config::write_default(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = Config::load(cli.config_file.as_deref())?;
    apply_overrides(&mut config, &cli);

    init_tracing(cli.verbose, config.logging.level.as_deref());
    info!("Starting Shellmate v0.1.0");

    let provider = AiProviderFactory::from_config(&config.ai_provider)
        .context("Could not set up the AI backend")?;

    let environment = environment::detect();
    let executor = ToolExecutor::new().with_timeout(config.session.command_timeout());
    let command_log = open_command_log(&config);
    let reader = RustylineReader::new()?;

    let mut shell = Shell::new(provider, executor, &environment, reader, std::io::stdout())
        .with_conversation(Conversation::with_retention(config.session.history))
        .with_command_log(command_log)
        .with_options(ShellOptions::from(&config.session));

    shell.run().await
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref provider) = cli.provider {
        if !provider.eq_ignore_ascii_case(&config.ai_provider.provider) {
            // a model name only makes sense for the backend it was configured with
            config.ai_provider.model = None;
        }
        config.ai_provider.provider = provider.clone();
    }
    if let Some(ref model) = cli.model {
        config.ai_provider.model = Some(model.clone());
    }
    if let Some(ref log_dir) = cli.log_dir {
        config.logging.log_dir = log_dir.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.session.command_timeout_secs = timeout;
    }
}

/// Diagnostics go to stderr so they never interleave with the conversation.
fn init_tracing(verbose: bool, configured_level: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured_level.unwrap_or("warn")))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_command_log(config: &Config) -> Box<dyn CommandLog> {
    match FileCommandLog::open(&config.logging.log_dir) {
        Ok(log) => {
            info!("Logging commands to {}", log.path().display());
            Box::new(log)
        }
        Err(e) => {
            warn!("Command logging disabled: {:#}", e);
            Box::new(NullCommandLog)
        }
    }
}
