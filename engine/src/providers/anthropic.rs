//! Anthropic messages adapter.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use super::http::send_json;
use super::normalize::{normalize, RawReply};
use super::{
    system_instruction, AdapterSettings, AgentId, ChatMessage, ChatRole, CredentialSource,
    ProviderAdapter,
};
use crate::resilience::{
    call_with_resilience, AttemptError, FailureReason, ProviderCallOutcome, RetryPolicy,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude via `POST {base}/messages`.
///
/// System messages move to the top-level `system` field; the remaining turns
/// keep their `user` / `assistant` roles.
pub struct AnthropicAdapter {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
    settings: AdapterSettings,
}

impl AnthropicAdapter {
    pub fn new(
        client: Client,
        credentials: Arc<dyn CredentialSource>,
        settings: AdapterSettings,
    ) -> Self {
        Self {
            client,
            credentials,
            settings,
        }
    }

    pub(crate) fn request_body(&self, conversation: &[ChatMessage]) -> Value {
        let messages: Vec<Value> = conversation
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": messages,
        });
        if let Some(system) = system_instruction(conversation) {
            body["system"] = Value::String(system);
        }
        body
    }

    /// The `content` fragment list.
    pub(crate) fn extract_reply(response: &Value) -> RawReply {
        RawReply::from_value(&response["content"])
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<Option<String>, AttemptError> {
        let request = self
            .client
            .post(self.settings.endpoint("messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body);
        let response = send_json(request).await?;
        Ok(normalize(&Self::extract_reply(&response)))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn agent(&self) -> AgentId {
        AgentId::Anthropic
    }

    async fn invoke(
        &self,
        conversation: &[ChatMessage],
        policy: &RetryPolicy,
    ) -> ProviderCallOutcome {
        let Some(api_key) = self.credentials.get_credential(self.agent()) else {
            warn!(agent = %self.agent(), "no credential configured, skipping call");
            return ProviderCallOutcome::Failure(FailureReason::MissingCredential);
        };

        let body = self.request_body(conversation);
        let (api_key, body) = (api_key.as_str(), &body);
        call_with_resilience("anthropic", policy, move |_| self.send_once(api_key, body)).await
    }
}
