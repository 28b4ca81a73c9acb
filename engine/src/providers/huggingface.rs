//! Hugging Face Inference API text-generation adapter.
//!
//! The text-generation task takes a single prompt string, so the conversation
//! is flattened with role labels before sending.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use super::http::send_json;
use super::normalize::{normalize, ContentFragment, RawReply};
use super::{
    flatten_conversation, AdapterSettings, AgentId, ChatMessage, CredentialSource,
    ProviderAdapter,
};
use crate::resilience::{
    call_with_resilience, AttemptError, FailureReason, ProviderCallOutcome, RetryPolicy,
};

pub struct HuggingFaceAdapter {
    client: Client,
    credentials: Arc<dyn CredentialSource>,
    settings: AdapterSettings,
}

impl HuggingFaceAdapter {
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
            "inputs": flatten_conversation(conversation),
            "parameters": {
                "max_new_tokens": self.settings.max_tokens,
                "return_full_text": false,
            },
        })
    }

    /// `[{"generated_text": ...}]`, or a bare object for some deployments.
    pub(crate) fn extract_reply(response: &Value) -> RawReply {
        match response {
            Value::Array(items) => RawReply::Fragments(
                items
                    .iter()
                    .map(|item| ContentFragment {
                        text: item
                            .get("generated_text")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                    .collect(),
            ),
            Value::Object(_) => RawReply::from_value(&response["generated_text"]),
            _ => RawReply::Unsupported,
        }
    }

    async fn send_once(&self, token: &str, body: &Value) -> Result<Option<String>, AttemptError> {
        let path = format!("models/{}", self.settings.model);
        let request = self
            .client
            .post(self.settings.endpoint(&path))
            .bearer_auth(token)
            .json(body);
        let response = send_json(request).await?;
        Ok(normalize(&Self::extract_reply(&response)))
    }
}

#[async_trait]
impl ProviderAdapter for HuggingFaceAdapter {
    fn agent(&self) -> AgentId {
        AgentId::HuggingFace
    }

    async fn invoke(
        &self,
        conversation: &[ChatMessage],
        policy: &RetryPolicy,
    ) -> ProviderCallOutcome {
        let Some(token) = self.credentials.get_credential(self.agent()) else {
            warn!(agent = %self.agent(), "no credential configured, skipping call");
            return ProviderCallOutcome::Failure(FailureReason::MissingCredential);
        };

        let body = self.request_body(conversation);
        let (token, body) = (token.as_str(), &body);
        call_with_resilience("huggingface", policy, move |_| self.send_once(token, body)).await
    }
}
