//! Turn execution: one provider call mapped to one transcript entry.
//!
//! Every outcome yields a well-formed [`Turn`]: failures become placeholder
//! text so the debate can always move on to the next speaker.

use tracing::{info, warn};

use super::prompt::ANSWER_MARKER;
use super::state::Turn;
use crate::providers::{AgentId, ChatMessage, ProviderRegistry};
use crate::resilience::{FailureReason, ProviderCallOutcome, RetryPolicy};

/// Optional label some models put in front of their reasoning.
pub const THOUGHT_MARKER: &str = "Thought:";

/// Answer recorded when a provider timed out on every attempt.
pub const TIMEOUT_ANSWER: &str = "(timed out waiting for a reply)";

/// Answer recorded when a provider could not be reached or gave nothing usable.
pub const NO_REPLY_ANSWER: &str = "(no reply: check credentials/network)";

/// Thought recorded alongside [`NO_REPLY_ANSWER`].
pub fn no_reply_thought(agent: AgentId, round: u32) -> String {
    format!(
        "{} gave no reply in round {} (check credentials/network)",
        agent.display_name(),
        round
    )
}

/// Split a reply into `(thought, answer)` at the answer marker.
///
/// Exactly one marker is required. With none or several, the whole text is
/// the answer and the thought is empty.
///
/// A single marker with nothing after it would yield an empty answer, so
/// that case also falls back to whole-text-as-answer rather than recording
/// a blank conclusion.
pub fn split_marked_reply(text: &str) -> (String, String) {
    let mut parts = text.split(ANSWER_MARKER);
    let (Some(before), Some(after), None) = (parts.next(), parts.next(), parts.next()) else {
        return (String::new(), text.trim().to_string());
    };

    let answer = after.trim();
    if answer.is_empty() {
        return (String::new(), text.trim().to_string());
    }

    let before = before.trim();
    let thought = before
        .strip_prefix(THOUGHT_MARKER)
        .unwrap_or(before)
        .trim();
    (thought.to_string(), answer.to_string())
}

/// Calls the adapter for an agent and records the result as a turn.
pub struct TurnExecutor {
    registry: ProviderRegistry,
    policy: RetryPolicy,
    system_prompt: String,
}

impl TurnExecutor {
    pub fn new(registry: ProviderRegistry, policy: RetryPolicy, system_prompt: String) -> Self {
        Self {
            registry,
            policy,
            system_prompt,
        }
    }

    /// Ask `agent` to respond to `prompt` in `round`.
    pub async fn execute(&self, agent: AgentId, prompt: &str, round: u32) -> Turn {
        let outcome = match self.registry.get(agent) {
            Some(adapter) => {
                let conversation = [
                    ChatMessage::system(self.system_prompt.as_str()),
                    ChatMessage::user(prompt),
                ];
                adapter.invoke(&conversation, &self.policy).await
            }
            None => {
                warn!(%agent, "no adapter registered for agent");
                ProviderCallOutcome::Failure(FailureReason::NoAdapter)
            }
        };

        info!(round, %agent, outcome = outcome.kind(), "turn finished");
        Self::turn_from_outcome(agent, round, outcome)
    }

    /// Map a call outcome to a transcript entry.
    pub fn turn_from_outcome(agent: AgentId, round: u32, outcome: ProviderCallOutcome) -> Turn {
        let (thought, answer) = match outcome {
            ProviderCallOutcome::Success(text) => split_marked_reply(&text),
            ProviderCallOutcome::Timeout => (String::new(), TIMEOUT_ANSWER.to_string()),
            ProviderCallOutcome::Failure(reason) => {
                warn!(round, %agent, %reason, "recording placeholder turn");
                (no_reply_thought(agent, round), NO_REPLY_ANSWER.to_string())
            }
        };
        Turn {
            round,
            agent,
            thought,
            answer,
        }
    }
}
