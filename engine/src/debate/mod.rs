//! Debate engine: sequential multi-agent rounds over one question.
//!
//! # Flow
//!
//! ```text
//! Idle ──start()──► Running ──last turn / cancel──► Idle
//!                     │
//!                     └─ per round, per agent:
//!                          compose prompt → execute turn → record
//!                          → persist snapshot → notify observers
//! ```
//!
//! There is no error phase: provider failures become placeholder turns and
//! the debate always runs to the end.

pub mod orchestrator;
pub mod persistence;
pub mod prompt;
pub mod state;
pub mod turn;

pub use orchestrator::{DebateError, DebateOrchestrator, DebateOutcome, ProgressObserver};
pub use persistence::{
    export_json, export_markdown, JsonFileStore, MemoryStore, PersistenceError, TranscriptSnapshot,
    TranscriptStore,
};
pub use prompt::{PromptComposer, ANSWER_MARKER};
pub use state::{DebatePhase, DebateSession, Progress, Transcript, Turn};
pub use turn::{split_marked_reply, TurnExecutor, NO_REPLY_ANSWER, TIMEOUT_ANSWER};
