//! Roundtable debate engine
//!
//! Several text-generation providers answer one question in sequential
//! rounds. The first speaker of each round answers the question; every later
//! speaker sees the answers already given in that round and agrees or
//! disagrees.
//!
//! # Components
//!
//! - [`providers`]: one adapter per provider behind [`providers::ProviderAdapter`],
//!   plus the response normalizer
//! - [`resilience`]: bounded timeout/retry/backoff around a single provider call
//! - [`debate`]: prompt composition, turn execution, orchestration and persistence
//! - [`config`]: TOML configuration
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use roundtable_engine::{
//!     AgentId, DebateOrchestrator, EngineConfig, EnvCredentials, MemoryStore, ProviderRegistry,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let registry = ProviderRegistry::from_config(&config, Arc::new(EnvCredentials))?;
//! let mut debate = DebateOrchestrator::new(registry, Arc::new(MemoryStore::new()), &config);
//! let outcome = debate
//!     .start("What is 2+2?", &[AgentId::OpenAi, AgentId::Anthropic], 2, &CancellationToken::new())
//!     .await?;
//! println!("{}", outcome.summary_line());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod debate;
pub mod providers;
pub mod resilience;

pub use config::{ConfigError, EngineConfig};
pub use debate::{
    export_json, export_markdown, DebateError, DebateOrchestrator, DebateOutcome, DebatePhase,
    JsonFileStore, MemoryStore, Progress, ProgressObserver, Transcript, TranscriptStore, Turn,
};
pub use providers::{
    AgentId, CredentialSource, EnvCredentials, ProviderAdapter, ProviderRegistry,
    StaticCredentials,
};
pub use resilience::{ProviderCallOutcome, RetryPolicy};
