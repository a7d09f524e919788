//! Command-line interface for the zalobot streaming protocol.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use zalobot_agent::tags::plain_text;
use zalobot_agent::{parse_response, StreamOptions, StreamOrchestrator};
use zalobot_core::config::{defaults, env_vars};
use zalobot_core::{ChatRequest, KeyManagerConfig, ProviderError, StreamConfig};
use zalobot_llm::{KeyManager, ScriptedAttempt, ScriptedProvider};
use zalobot_messages::ConsoleDispatcher;

/// Zalobot - replay and inspect tagged chatbot responses.
#[derive(Parser, Debug)]
#[command(name = "zalobot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Stream configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a recorded model reply through the orchestrator.
    Replay(ReplayArgs),
    /// Parse a complete reply and print it as JSON.
    Parse {
        /// The raw model output.
        text: String,
    },
    /// Print the text left after removing every tag.
    Strip {
        /// The raw model output.
        text: String,
    },
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// File holding the raw model output.
    file: PathBuf,
    /// Characters per streamed chunk.
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,
    /// Failures to inject before the reply streams, in order.
    #[arg(long, value_enum)]
    fail: Vec<FailKind>,
    /// API keys to rotate through.
    #[arg(long, value_delimiter = ',', default_value = "replay-key")]
    keys: Vec<String>,
    /// Models to fall back through.
    #[arg(long, value_delimiter = ',', default_value = defaults::MODEL)]
    models: Vec<String>,
    /// Prompt sent with the replay.
    #[arg(long, default_value = "")]
    prompt: String,
    /// Print actions as JSON.
    #[arg(long)]
    json: bool,
}

/// Provider failure injected by `replay`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FailKind {
    Overloaded,
    Auth,
    RateLimit,
}

impl FailKind {
    fn to_error(self) -> ProviderError {
        match self {
            FailKind::Overloaded => ProviderError::Overloaded("503 injected by replay".into()),
            FailKind::Auth => ProviderError::AuthDenied("403 injected by replay".into()),
            FailKind::RateLimit => ProviderError::RateLimited("429 injected by replay".into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Replay(args) => run_replay(args, config).await,
        Command::Parse { text } => {
            let parsed = parse_response(&text);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }
        Command::Strip { text } => {
            println!("{}", plain_text(&text));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let json_logging = env_vars::parsed::<bool>(env_vars::LOG_JSON).unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

/// Defaults, then the TOML file when given, then `ZALOBOT_*` variables.
fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    match path {
        Some(path) => {
            let config = StreamConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok(config.apply_env_overrides())
        }
        None => Ok(StreamConfig::from_env()),
    }
}

/// Scripted attempts: one failing open per injected failure, then the reply.
fn replay_attempts(text: &str, chunk_size: usize, fail: &[FailKind]) -> Vec<ScriptedAttempt> {
    fail.iter()
        .map(|kind| ScriptedAttempt::fail_on_open(kind.to_error()))
        .chain(std::iter::once(ScriptedAttempt::from_text(text, chunk_size)))
        .collect()
}

async fn run_replay(replay: ReplayArgs, config: StreamConfig) -> Result<()> {
    let text = std::fs::read_to_string(&replay.file)
        .with_context(|| format!("Failed to read {}", replay.file.display()))?;

    let provider = Arc::new(
        ScriptedProvider::new(replay_attempts(&text, replay.chunk_size, &replay.fail))
            .with_name("replay"),
    );
    let keys = KeyManager::new(KeyManagerConfig::new(replay.keys, replay.models))?;
    let orchestrator = StreamOrchestrator::new(provider, Arc::new(keys), config);
    let dispatcher = ConsoleDispatcher::new("replay").with_json(replay.json);

    let outcome = orchestrator
        .generate_content_stream(
            &ChatRequest::new(replay.prompt),
            &dispatcher,
            StreamOptions::new(),
        )
        .await;

    println!(
        "status={:?} attempts={} overload_retries={}",
        outcome.status, outcome.attempts, outcome.overload_retries
    );
    if let Some(error) = outcome.error {
        println!("last_error={}", error);
    }
    Ok(())
}
