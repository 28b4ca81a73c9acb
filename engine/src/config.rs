//! Engine configuration.
//!
//! Loaded from TOML; every field has a default so a partial (or absent)
//! file is fine.
//!
//! ```toml
//! max_rounds = 5
//! language = "English"
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 2000
//! per_attempt_timeout_ms = 60000
//! max_suggested_delay_ms = 60000
//!
//! [providers.openai]
//! model = "gpt-4o-mini"
//! base_url = "http://localhost:4000/v1"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::{AdapterSettings, AgentId};
use crate::resilience::RetryPolicy;

/// Hard upper bound on rounds per debate.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Round counts above this are clamped.
    pub max_rounds: u32,
    /// Working language the agents are asked to answer in.
    pub language: String,
    /// Applied uniformly to every provider adapter.
    pub retry: RetryPolicy,
    pub providers: ProvidersConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            language: "English".to_string(),
            retry: RetryPolicy::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Effective round bound (at least 1).
    pub fn round_limit(&self) -> u32 {
        self.max_rounds.max(1)
    }
}

/// Optional per-provider endpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderOverride,
    pub anthropic: ProviderOverride,
    pub gemini: ProviderOverride,
    pub huggingface: ProviderOverride,
}

impl ProvidersConfig {
    pub fn override_for(&self, agent: AgentId) -> &ProviderOverride {
        match agent {
            AgentId::OpenAi => &self.openai,
            AgentId::Anthropic => &self.anthropic,
            AgentId::Gemini => &self.gemini,
            AgentId::HuggingFace => &self.huggingface,
        }
    }

    /// Defaults for `agent` with any configured overrides applied.
    pub fn settings_for(&self, agent: AgentId) -> AdapterSettings {
        let mut settings = AdapterSettings::default_for(agent);
        let over = self.override_for(agent);
        if let Some(model) = &over.model {
            settings.model = model.clone();
        }
        if let Some(base_url) = &over.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(max_tokens) = over.max_tokens {
            settings.max_tokens = max_tokens;
        }
        settings
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
}
