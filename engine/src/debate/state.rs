//! Debate state: phases, turns, transcript and session tracking.

use serde::{Deserialize, Serialize};

use crate::providers::AgentId;

/// Phase of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DebatePhase {
    /// No debate in progress.
    #[default]
    Idle,
    /// Rounds are being played.
    Running,
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// One agent's response within one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Round number (1-indexed).
    pub round: u32,
    pub agent: AgentId,
    /// Reasoning preceding the answer marker; empty when the reply had none.
    pub thought: String,
    pub answer: String,
}

/// Ordered history of turns. Append-only.
///
/// Turns are stored in `(round, agent order)` order, which lets
/// [`round_turns`](Self::round_turns) hand out a contiguous slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        debug_assert!(
            self.turns.last().map_or(true, |last| last.round <= turn.round),
            "turns must be appended in round order"
        );
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Turns recorded so far in `round`, in append order.
    pub fn round_turns(&self, round: u32) -> &[Turn] {
        let start = self.turns.partition_point(|t| t.round < round);
        let end = self.turns.partition_point(|t| t.round <= round);
        &self.turns[start..end]
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Turn counters reported to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// `completed / total`, clamped to `[0, 1]`; zero when nothing is scheduled.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }

    pub fn is_done(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// A debate: question, participants, round limit and the transcript so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateSession {
    pub question: String,
    /// Turn order within every round.
    pub agents: Vec<AgentId>,
    pub round_count: u32,
    transcript: Transcript,
}

impl DebateSession {
    pub fn new(question: &str, agents: Vec<AgentId>, round_count: u32) -> Self {
        Self {
            question: question.to_string(),
            agents,
            round_count,
            transcript: Transcript::new(),
        }
    }

    /// A session wrapping a previously persisted transcript.
    ///
    /// It schedules no turns, so its progress reads zero.
    pub fn restored(transcript: Transcript) -> Self {
        Self {
            transcript,
            ..Self::default()
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) fn record(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }

    pub fn total_turns(&self) -> usize {
        self.round_count as usize * self.agents.len()
    }

    pub fn completed_turns(&self) -> usize {
        if self.total_turns() == 0 {
            0
        } else {
            self.transcript.len()
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed_turns(),
            total: self.total_turns(),
        }
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        let round = self.transcript.last().map_or(0, |t| t.round);
        format!(
            "round {}/{} | {} turns | {} agents",
            round,
            self.round_count,
            self.progress(),
            self.agents.len()
        )
    }
}
