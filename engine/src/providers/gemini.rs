//! Google Gemini `generateContent` adapter.

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

/// Gemini via `POST {base}/models/{model}:generateContent`.
///
/// System messages become `systemInstruction`; assistant turns use Gemini's
/// `model` role.
pub struct GeminiAdapter {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
    settings: AdapterSettings,
}

impl GeminiAdapter {
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
        let contents: Vec<Value> = conversation
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    ChatRole::System => return None,
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                };
                Some(json!({"role": role, "parts": [{"text": m.content}]}))
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.settings.max_tokens,
            },
        });
        if let Some(system) = system_instruction(conversation) {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        body
    }

    /// `candidates[0].content.parts`.
    pub(crate) fn extract_reply(response: &Value) -> RawReply {
        RawReply::from_value(&response["candidates"][0]["content"]["parts"])
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<Option<String>, AttemptError> {
        let path = format!("models/{}:generateContent", self.settings.model);
        let request = self
            .client
            .post(self.settings.endpoint(&path))
            .header("x-goog-api-key", api_key)
            .json(body);
        let response = send_json(request).await?;
        Ok(normalize(&Self::extract_reply(&response)))
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn agent(&self) -> AgentId {
        AgentId::Gemini
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
        call_with_resilience("gemini", policy, move |_| self.send_once(api_key, body)).await
    }
}
