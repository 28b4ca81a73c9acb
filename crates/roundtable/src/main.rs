use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roundtable_engine::{
    export_json, export_markdown, AgentId, DebateOrchestrator, EngineConfig, EnvCredentials,
    JsonFileStore, Progress, ProviderRegistry,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Question the agents debate
    question: String,

    /// Participating agent, in speaking order (openai, claude, gemini, huggingface)
    #[arg(long = "agent", required = true)]
    agents: Vec<AgentId>,

    /// Number of rounds (clamped to the configured maximum)
    #[arg(long, default_value_t = 2)]
    rounds: u32,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the transcript snapshot is kept between turns
    #[arg(long, default_value = "roundtable-transcript.json")]
    state: PathBuf,

    /// Write the finished transcript as JSON to this path
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    info!(
        rounds = args.rounds,
        agents = ?args.agents,
        language = %config.language,
        state = %args.state.display(),
        "Roundtable starting"
    );

    let registry = ProviderRegistry::from_config(&config, Arc::new(EnvCredentials))
        .context("failed to set up provider adapters")?;
    let store = Arc::new(JsonFileStore::new(&args.state));

    let (progress_tx, mut progress_rx) = watch::channel(Progress::default());
    let mut debate = DebateOrchestrator::new(registry, store, &config).with_observer(progress_tx);
    if args.rounds > debate.max_rounds() {
        warn!(
            requested = args.rounds,
            max_rounds = debate.max_rounds(),
            "Requested rounds exceed the configured maximum, clamping"
        );
    }

    let printer = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let progress = *progress_rx.borrow_and_update();
            info!(
                %progress,
                percent = (progress.fraction() * 100.0).round() as u32,
                "Turn recorded"
            );
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping debate");
                cancel.cancel();
            }
        })
    };

    let outcome = debate
        .start(&args.question, &args.agents, args.rounds, &cancel)
        .await?;
    ctrl_c.abort();

    let transcript = debate.transcript().clone();
    // Dropping the orchestrator closes the progress channel.
    drop(debate);
    if let Err(e) = printer.await {
        warn!(error = %e, "Progress printer task failed");
    }

    println!("{}", export_markdown(&args.question, &transcript));
    info!(summary = %outcome.summary_line(), "Debate finished");

    if let Some(path) = &args.export {
        let bytes = export_json(&transcript)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        info!(path = %path.display(), "Transcript exported");
    }

    Ok(())
}
