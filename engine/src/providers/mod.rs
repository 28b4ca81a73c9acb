//! Provider adapters for the debating agents.
//!
//! Each adapter speaks one provider's chat/generation HTTP protocol behind
//! the common [`ProviderAdapter`] contract, so the turn executor never needs
//! to know which provider it is talking to. Adapters are looked up by
//! [`AgentId`] through a [`ProviderRegistry`].

pub mod anthropic;
pub mod gemini;
pub mod http;
pub mod huggingface;
pub mod normalize;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::resilience::{ProviderCallOutcome, RetryPolicy};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use huggingface::HuggingFaceAdapter;
pub use normalize::{normalize, normalize_value, ContentFragment, RawReply};
pub use openai::OpenAiAdapter;

/// A participating text-generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    OpenAi,
    Anthropic,
    Gemini,
    HuggingFace,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::HuggingFace,
    ];

    /// Name shown to other agents and in exported transcripts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "GPT",
            Self::Anthropic => "Claude",
            Self::Gemini => "Gemini",
            Self::HuggingFace => "Hugging Face",
        }
    }

    /// Environment variable holding this provider's credential.
    pub fn credential_env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::HuggingFace => "HF_API_TOKEN",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
            Self::HuggingFace => write!(f, "huggingface"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown agent '{0}' (expected one of: openai, anthropic, gemini, huggingface)")]
pub struct UnknownAgent(String);

impl std::str::FromStr for AgentId {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gpt" | "chatgpt" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            other => Err(UnknownAgent(other.to_string())),
        }
    }
}

/// Role tag on a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Label used when a conversation has to be flattened to plain text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Flatten a conversation for providers that only take a prompt string.
///
/// Every message is prefixed with its role label and the result ends with an
/// open `Assistant:` cue for the model to complete.
pub fn flatten_conversation(conversation: &[ChatMessage]) -> String {
    let mut out = String::new();
    for message in conversation {
        out.push_str(message.role.label());
        out.push_str(":\n");
        out.push_str(message.content.trim());
        out.push_str("\n\n");
    }
    out.push_str(ChatRole::Assistant.label());
    out.push(':');
    out
}

/// System messages joined into one instruction block (`None` if there are none).
pub(crate) fn system_instruction(conversation: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = conversation
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Source of provider credentials.
pub trait CredentialSource: Send + Sync {
    /// The credential for `agent`, or `None` when absent or blank.
    fn get_credential(&self, agent: AgentId) -> Option<String>;
}

/// Reads credentials from each provider's environment variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn get_credential(&self, agent: AgentId) -> Option<String> {
        std::env::var(agent.credential_env_var())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Fixed in-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<AgentId, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, agent: AgentId, key: impl Into<String>) -> Self {
        self.keys.insert(agent, key.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn get_credential(&self, agent: AgentId) -> Option<String> {
        self.keys
            .get(&agent)
            .filter(|key| !key.trim().is_empty())
            .cloned()
    }
}

/// Endpoint settings for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl AdapterSettings {
    /// Public endpoint and model used when nothing is configured.
    pub fn default_for(agent: AgentId) -> Self {
        let (model, base_url) = match agent {
            AgentId::OpenAi => ("gpt-4o", "https://api.openai.com/v1"),
            AgentId::Anthropic => ("claude-sonnet-4-20250514", "https://api.anthropic.com/v1"),
            AgentId::Gemini => (
                "gemini-1.5-pro",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            AgentId::HuggingFace => (
                "mistralai/Mistral-7B-Instruct-v0.3",
                "https://api-inference.huggingface.co",
            ),
        };
        Self {
            model: model.to_string(),
            base_url: base_url.to_string(),
            max_tokens: 1024,
        }
    }

    /// `base_url` joined with `path`, without doubled slashes.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Common contract for every provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which agent this adapter speaks for.
    fn agent(&self) -> AgentId;

    /// Send `conversation` to the provider under `policy`.
    ///
    /// A missing credential returns `Failure` immediately without touching
    /// the network.
    async fn invoke(&self, conversation: &[ChatMessage], policy: &RetryPolicy)
        -> ProviderCallOutcome;
}

/// Shared reference to a provider adapter.
pub type SharedAdapter = Arc<dyn ProviderAdapter>;

/// Lookup table from [`AgentId`] to its adapter.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<AgentId, SharedAdapter>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build all four adapters from configuration, sharing one HTTP client.
    pub fn from_config(
        config: &EngineConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let providers = &config.providers;
        let registry = Self::new()
            .with(Arc::new(OpenAiAdapter::new(
                client.clone(),
                credentials.clone(),
                providers.settings_for(AgentId::OpenAi),
            )))
            .with(Arc::new(AnthropicAdapter::new(
                client.clone(),
                credentials.clone(),
                providers.settings_for(AgentId::Anthropic),
            )))
            .with(Arc::new(GeminiAdapter::new(
                client.clone(),
                credentials.clone(),
                providers.settings_for(AgentId::Gemini),
            )))
            .with(Arc::new(HuggingFaceAdapter::new(
                client,
                credentials,
                providers.settings_for(AgentId::HuggingFace),
            )));
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same agent.
    pub fn register(&mut self, adapter: SharedAdapter) {
        self.adapters.insert(adapter.agent(), adapter);
    }

    pub fn with(mut self, adapter: SharedAdapter) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, agent: AgentId) -> Option<&SharedAdapter> {
        self.adapters.get(&agent)
    }

    /// Registered agents in stable order.
    pub fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self.adapters.keys().copied().collect();
        agents.sort();
        agents
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("agents", &self.agents())
            .finish()
    }
}
