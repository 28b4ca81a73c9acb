//! Debate orchestrator: drives the round/agent loop.
//!
//! Turns are strictly sequential: each debate prompt depends on the answers
//! given earlier in the same round, so no two provider calls ever overlap.
//! Provider failures never abort the loop; they arrive here already turned
//! into placeholder turns by the [`TurnExecutor`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::persistence::TranscriptStore;
use super::prompt::PromptComposer;
use super::state::{DebatePhase, DebateSession, Progress, Transcript};
use super::turn::TurnExecutor;
use crate::config::EngineConfig;
use crate::providers::{AgentId, ProviderRegistry};

/// Reasons `start` refuses to run. State is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebateError {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("no agents selected")]
    NoAgents,
    #[error("round count must be at least 1")]
    ZeroRounds,
}

/// Receives `(completed, total)` after every recorded turn.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

impl ProgressObserver for watch::Sender<Progress> {
    fn on_progress(&self, progress: Progress) {
        // Works with zero receivers too.
        self.send_replace(progress);
    }
}

impl<T: ProgressObserver + ?Sized> ProgressObserver for Arc<T> {
    fn on_progress(&self, progress: Progress) {
        (**self).on_progress(progress);
    }
}

/// Summary of one `start` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateOutcome {
    /// Rounds in which every agent got its turn.
    pub rounds_completed: u32,
    pub turns_completed: usize,
    pub total_turns: usize,
    /// Whether the run stopped early on the cancellation token.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DebateOutcome {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.turns_completed == self.total_turns
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        let status = if self.is_complete() {
            "COMPLETE"
        } else {
            "CANCELLED"
        };
        let elapsed = (self.finished_at - self.started_at).num_milliseconds();
        format!(
            "[{}] {} rounds | {}/{} turns | {}ms",
            status, self.rounds_completed, self.turns_completed, self.total_turns, elapsed
        )
    }
}

/// Owns the debate session and runs it to completion.
pub struct DebateOrchestrator {
    executor: TurnExecutor,
    composer: PromptComposer,
    store: Arc<dyn TranscriptStore>,
    observers: Vec<Box<dyn ProgressObserver>>,
    max_rounds: u32,
    phase: DebatePhase,
    session: DebateSession,
}

impl DebateOrchestrator {
    /// Build an orchestrator and restore the last persisted transcript.
    ///
    /// A failing `load` is logged and treated as "nothing stored".
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn TranscriptStore>,
        config: &EngineConfig,
    ) -> Self {
        let composer = PromptComposer::new(config.language.clone());
        let executor = TurnExecutor::new(registry, config.retry.clone(), composer.system_prompt());

        let session = match store.load() {
            Ok(Some(turns)) => {
                info!(turns = turns.len(), "restored persisted transcript");
                DebateSession::restored(Transcript::from_turns(turns))
            }
            Ok(None) => DebateSession::default(),
            Err(e) => {
                warn!(error = %e, "failed to load persisted transcript, starting empty");
                DebateSession::default()
            }
        };

        Self {
            executor,
            composer,
            store,
            observers: Vec::new(),
            max_rounds: config.round_limit(),
            phase: DebatePhase::Idle,
            session,
        }
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Run a full debate.
    ///
    /// Rejects an empty question, an empty agent list or zero rounds.
    /// Otherwise replaces the transcript and plays `round_count` rounds
    /// (clamped to the configured maximum) with `agent_order` speaking in
    /// order, duplicates dropped. Cancelling `cancel` stops before the next
    /// turn, or abandons the in-flight call; turns already recorded are kept.
    pub async fn start(
        &mut self,
        question: &str,
        agent_order: &[AgentId],
        round_count: u32,
        cancel: &CancellationToken,
    ) -> Result<DebateOutcome, DebateError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DebateError::EmptyQuestion);
        }
        let agents = dedup_agents(agent_order);
        if agents.is_empty() {
            return Err(DebateError::NoAgents);
        }
        if round_count == 0 {
            return Err(DebateError::ZeroRounds);
        }
        if agents.len() < agent_order.len() {
            warn!(
                requested = agent_order.len(),
                kept = agents.len(),
                "dropped duplicate agents"
            );
        }
        let rounds = if round_count > self.max_rounds {
            warn!(
                requested = round_count,
                max = self.max_rounds,
                "round count clamped"
            );
            self.max_rounds
        } else {
            round_count
        };

        let started_at = Utc::now();
        self.session = DebateSession::new(question, agents.clone(), rounds);
        self.phase = DebatePhase::Running;
        info!(
            rounds,
            agents = agents.len(),
            total_turns = self.session.total_turns(),
            "debate started"
        );

        let mut cancelled = false;
        'rounds: for round in 1..=rounds {
            debug!(round, "round started");
            for (index, &agent) in agents.iter().enumerate() {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'rounds;
                }

                let prompt = self.composer.compose(
                    question,
                    self.session.transcript().round_turns(round),
                    index,
                );

                let turn = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(round, %agent, "debate cancelled during provider call");
                        cancelled = true;
                        break 'rounds;
                    }
                    turn = self.executor.execute(agent, &prompt, round) => turn,
                };

                self.session.record(turn);
                self.persist().await;
                self.notify();

                // Cooperative checkpoint between turns.
                tokio::task::yield_now().await;
            }
        }

        self.phase = DebatePhase::Idle;
        let outcome = DebateOutcome {
            rounds_completed: (self.session.completed_turns() / agents.len()) as u32,
            turns_completed: self.session.completed_turns(),
            total_turns: self.session.total_turns(),
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        info!(summary = %outcome.summary_line(), "debate finished");
        Ok(outcome)
    }

    /// Store writes may block on disk, so they run off the async workers.
    async fn persist(&self) {
        let store = Arc::clone(&self.store);
        let turns = self.session.transcript().turns().to_vec();
        match tokio::task::spawn_blocking(move || store.save(&turns)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to persist transcript snapshot"),
            Err(e) => warn!(error = %e, "transcript persist task failed"),
        }
    }

    fn notify(&self) {
        let progress = self.session.progress();
        debug!(%progress, "progress");
        for observer in &self.observers {
            observer.on_progress(progress);
        }
    }

    pub fn phase(&self) -> DebatePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == DebatePhase::Running
    }

    /// Zero before the first `start`.
    pub fn progress(&self) -> Progress {
        self.session.progress()
    }

    pub fn transcript(&self) -> &Transcript {
        self.session.transcript()
    }

    pub fn session(&self) -> &DebateSession {
        &self.session
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }
}

/// Keep the first occurrence of each agent, preserving order.
fn dedup_agents(agent_order: &[AgentId]) -> Vec<AgentId> {
    let mut agents: Vec<AgentId> = Vec::with_capacity(agent_order.len());
    for &agent in agent_order {
        if !agents.contains(&agent) {
            agents.push(agent);
        }
    }
    agents
}
