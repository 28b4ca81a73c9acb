//! Prompt composition for debate turns.
//!
//! The first speaker in a round gets a seed prompt with just the question.
//! Later speakers see the answers already given in the same round and are
//! asked to agree or disagree. Every prompt asks for a final line starting
//! with [`ANSWER_MARKER`] so the conclusion can be located.

use super::state::Turn;

/// Literal prefix of an agent's final answer.
pub const ANSWER_MARKER: &str = "Answer:";

#[derive(Debug, Clone)]
pub struct PromptComposer {
    language: String,
}

impl PromptComposer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// System message sent with every turn.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are one participant in a moderated debate between several AI assistants. \
             Think carefully, be concise, and always reply in {}.",
            self.language
        )
    }

    /// Seed prompt for the first speaker of a round.
    pub fn seed_prompt(&self, question: &str) -> String {
        format!(
            "Question: {question}\n\n\
             Answer the question directly in {language}. You may reason briefly first, \
             then finish with a single line that starts with \"{marker}\" followed by your \
             final answer.",
            question = question.trim(),
            language = self.language,
            marker = ANSWER_MARKER,
        )
    }

    /// Prompt for speaker `speaker_index` (0-based) after `prior_turns`.
    ///
    /// `prior_turns` must be exactly the turns already recorded in the
    /// current round, in order.
    pub fn debate_prompt(
        &self,
        question: &str,
        prior_turns: &[Turn],
        speaker_index: usize,
    ) -> String {
        let mut prompt = format!("Question: {}\n\n", question.trim());
        prompt.push_str("Other participants have already answered in this round:\n\n");
        for turn in prior_turns {
            prompt.push_str(&format!(
                "[{}]\n{}\n\n",
                turn.agent.display_name(),
                turn.answer.trim()
            ));
        }
        prompt.push_str(&format!(
            "You are participant {position}. State whether you agree or disagree with the \
             answers above and explain your reasoning in {language}. Finish with a single \
             line that starts with \"{marker}\" followed by your final answer.",
            position = speaker_index + 1,
            language = self.language,
            marker = ANSWER_MARKER,
        ));
        prompt
    }

    /// Seed prompt for the first speaker, debate prompt for everyone after.
    pub fn compose(&self, question: &str, prior_turns: &[Turn], speaker_index: usize) -> String {
        if speaker_index == 0 {
            self.seed_prompt(question)
        } else {
            self.debate_prompt(question, prior_turns, speaker_index)
        }
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new("English")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AgentId;

    fn turn(agent: AgentId, answer: &str) -> Turn {
        Turn {
            round: 1,
            agent,
            thought: "hidden reasoning".to_string(),
            answer: answer.to_string(),
        }
    }

    #[test]
    fn test_seed_prompt() {
        let prompt = PromptComposer::new("German").seed_prompt("  What is 2+2? ");
        assert!(prompt.starts_with("Question: What is 2+2?\n"));
        assert!(prompt.contains("German"));
        assert!(prompt.contains("\"Answer:\""));
    }

    #[test]
    fn test_debate_prompt_lists_prior_answers_in_order() {
        let prior = vec![
            turn(AgentId::OpenAi, "four"),
            turn(AgentId::Anthropic, "also four"),
        ];
        let prompt = PromptComposer::default().debate_prompt("What is 2+2?", &prior, 2);

        let gpt = prompt.find("[GPT]\nfour").unwrap();
        let claude = prompt.find("[Claude]\nalso four").unwrap();
        assert!(gpt < claude);
        assert!(prompt.contains("participant 3"));
        assert!(prompt.contains("agree or disagree"));
        assert!(prompt.contains(ANSWER_MARKER));
        // Only answers are shared, not reasoning.
        assert!(!prompt.contains("hidden reasoning"));
    }

    #[test]
    fn test_compose_switches_on_speaker_index() {
        let composer = PromptComposer::default();
        let prior = vec![turn(AgentId::Gemini, "five")];

        let first = composer.compose("q", &[], 0);
        assert_eq!(first, composer.seed_prompt("q"));
        assert!(!first.contains("Other participants"));

        let second = composer.compose("q", &prior, 1);
        assert!(second.contains("[Gemini]\nfive"));
    }

    #[test]
    fn test_system_prompt_mentions_language() {
        assert!(PromptComposer::new("Spanish")
            .system_prompt()
            .contains("Spanish"));
    }
}
