//! OpenAI chat-completions adapter.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use super::http::send_json;
use super::normalize::{normalize, RawReply};
use super::{AdapterSettings, AgentId, ChatMessage, CredentialSource, ProviderAdapter};
use crate::resilience::{
    call_with_resilience, AttemptError, FailureReason, ProviderCallOutcome, RetryPolicy,
};

/// GPT via `POST {base}/chat/completions`. Roles map one-to-one.
pub struct OpenAiAdapter {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
    settings: AdapterSettings,
}

impl OpenAiAdapter {
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
        json!({
            "model": self.settings.model,
            "messages": conversation,
            "max_tokens": self.settings.max_tokens,
        })
    }

    /// `choices[0].message.content`, which may be a string or a fragment list.
    pub(crate) fn extract_reply(response: &Value) -> RawReply {
        RawReply::from_value(&response["choices"][0]["message"]["content"])
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<Option<String>, AttemptError> {
        let request = self
            .client
            .post(self.settings.endpoint("chat/completions"))
            .bearer_auth(api_key)
            .json(body);
        let response = send_json(request).await?;
        Ok(normalize(&Self::extract_reply(&response)))
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn agent(&self) -> AgentId {
        AgentId::OpenAi
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
        call_with_resilience("openai", policy, move |_| self.send_once(api_key, body)).await
    }
}
