use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use weft_agents::Orchestrator;
use weft_client::ClientState;
use weft_core::config::Config;
use weft_core::transcript::TranscriptEntry;
use weft_core::types::RemoteFile;
use weft_core::writer::EventWriter;
use weft_providers::openai::OpenAiProvider;
use weft_providers::sandbox::LocalSandboxProvider;
use weft_providers::search::ExaSearch;
use weft_providers::{Credentials, LlmProvider};

#[derive(Parser)]
#[command(
    name = "weft",
    about = "Delegated-agent event gateway — run one conversational turn from the terminal",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and print the outbound event stream as JSON lines
    Chat {
        /// Message to send
        message: String,

        /// Model override for the orchestrator loop
        #[arg(long)]
        model: Option<String>,

        /// Tabular attachment as name=url (repeatable)
        #[arg(long = "file", value_name = "NAME=URL")]
        files: Vec<String>,
    },

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Chat {
            message,
            model,
            files,
        } => {
            if let Some(model) = model {
                config.models.get_or_insert_default().orchestrator = Some(model);
            }
            chat(config, &message, parse_files(&files)?).await
        }
    }
}

async fn chat(config: Config, message: &str, files: Vec<RemoteFile>) -> anyhow::Result<()> {
    let api_key = config
        .resolve_model_api_key()
        .ok_or_else(|| anyhow::anyhow!("no model API key configured; set OPENAI_API_KEY"))?;
    let credentials = Credentials::ApiKey { api_key };

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.models.as_ref().and_then(|m| m.base_url.as_deref()),
    ));
    let search = Arc::new(ExaSearch::new(
        config.resolve_search_api_key().unwrap_or_default(),
        config.search.as_ref().and_then(|s| s.base_url.as_deref()),
    ));
    let sandbox = Arc::new(LocalSandboxProvider);

    let (writer, mut rx) = EventWriter::channel();

    // Print the stream as it arrives and fold it for the session summary.
    let consumer = tokio::spawn(async move {
        let mut state = ClientState::new();
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(%e, "unserializable event"),
            }
            if let Err(e) = state.apply(&event) {
                warn!(%e, "protocol violation in event stream");
            }
        }
        state
    });

    let orchestrator = Orchestrator::new(
        provider,
        credentials,
        Arc::new(config),
        writer,
        search,
        sandbox,
        files,
    );
    let answer = orchestrator
        .run_turn(vec![TranscriptEntry::user_text(message)])
        .await;

    // Close the channel so the consumer drains out.
    drop(orchestrator);
    let mut state = consumer
        .await
        .map_err(|e| anyhow::anyhow!("event consumer panicked: {e}"))?;

    let answer = answer?;
    println!("\n{answer}");

    if let Some(artifact) = state.current_artifact() {
        eprintln!(
            "artifact '{}' ({} chars)",
            artifact.title,
            artifact.content.len()
        );
    }

    // Session teardown — nothing persists past the turn.
    state.clear();
    Ok(())
}

fn parse_files(specs: &[String]) -> anyhow::Result<Vec<RemoteFile>> {
    specs
        .iter()
        .map(|spec| {
            let (name, url) = spec
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected name=url, got: {spec}"))?;
            Ok(RemoteFile {
                filename: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}
