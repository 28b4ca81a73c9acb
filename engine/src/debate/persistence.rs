//! Transcript persistence and export.
//!
//! The orchestrator hands a full snapshot to a [`TranscriptStore`] after
//! every turn and reads one back at start-up. Snapshots are wrapped in a
//! versioned [`TranscriptSnapshot`] envelope; exports are the bare turn list.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{Transcript, Turn};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialize failed: {0}")]
    SerializeFailed(String),

    #[error("deserialize failed: {0}")]
    DeserializeFailed(String),

    #[error("snapshot version {found} is newer than supported {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Persisted form of a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

impl TranscriptSnapshot {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(turns: &[Turn]) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: Utc::now(),
            turns: turns.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PersistenceError::SerializeFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| PersistenceError::DeserializeFailed(e.to_string()))?;

        if snapshot.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

/// Key-value style store holding the latest transcript snapshot.
///
/// `save` overwrites the previous snapshot as a whole. Both methods are
/// synchronous and may block on I/O; the orchestrator calls `save` through
/// `tokio::task::spawn_blocking`.
pub trait TranscriptStore: Send + Sync {
    fn save(&self, turns: &[Turn]) -> Result<(), PersistenceError>;

    /// The last saved snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Vec<Turn>>, PersistenceError>;
}

/// Keeps the serialized snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently stored (0 when empty).
    pub fn stored_len(&self) -> usize {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().map_or(0, String::len))
            .unwrap_or(0)
    }
}

impl TranscriptStore for MemoryStore {
    fn save(&self, turns: &[Turn]) -> Result<(), PersistenceError> {
        let json = TranscriptSnapshot::new(turns).to_json()?;
        let mut slot = self.slot.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        *slot = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<Vec<Turn>>, PersistenceError> {
        let slot = self.slot.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        slot.as_deref()
            .map(|json| TranscriptSnapshot::from_json(json).map(|s| s.turns))
            .transpose()
    }
}

/// Writes the snapshot to a JSON file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl TranscriptStore for JsonFileStore {
    fn save(&self, turns: &[Turn]) -> Result<(), PersistenceError> {
        let json = TranscriptSnapshot::new(turns).to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(parent, e))?;
        }

        // Write-then-rename so readers never see a half-written snapshot.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            self.io_err(&self.path, e)
        })
    }

    fn load(&self) -> Result<Option<Vec<Turn>>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => TranscriptSnapshot::from_json(&json).map(|s| Some(s.turns)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(&self.path, e)),
        }
    }
}

/// Export as a pretty JSON array of `{round, agent, thought, answer}`.
pub fn export_json(transcript: &Transcript) -> Result<Vec<u8>, PersistenceError> {
    serde_json::to_vec_pretty(transcript)
        .map_err(|e| PersistenceError::SerializeFailed(e.to_string()))
}

/// Human-readable rendition grouped by round.
pub fn export_markdown(question: &str, transcript: &Transcript) -> String {
    let mut out = format!("# {}\n", question.trim());
    let mut current_round = 0;
    for turn in transcript {
        if turn.round != current_round {
            current_round = turn.round;
            out.push_str(&format!("\n## Round {}\n", current_round));
        }
        out.push_str(&format!("\n### {}\n\n", turn.agent.display_name()));
        if !turn.thought.is_empty() {
            for line in turn.thought.lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&format!("**Answer:** {}\n", turn.answer));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AgentId;

    fn sample_turns() -> Vec<Turn> {
        vec![
            Turn {
                round: 1,
                agent: AgentId::OpenAi,
                thought: "2 plus 2".to_string(),
                answer: "4".to_string(),
            },
            Turn {
                round: 1,
                agent: AgentId::Anthropic,
                thought: String::new(),
                answer: "Agree, 4".to_string(),
            },
            Turn {
                round: 2,
                agent: AgentId::OpenAi,
                thought: String::new(),
                answer: "Still 4".to_string(),
            },
        ]
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.stored_len(), 0);

        store.save(&sample_turns()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample_turns()));
        assert!(store.stored_len() > 0);

        // Later saves overwrite.
        store.save(&sample_turns()[..1]).unwrap();
        assert_eq!(store.load().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("transcript.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&sample_turns()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample_turns()));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_failed_rename_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        // A directory in the way makes the final rename fail.
        std::fs::create_dir(&path).unwrap();
        let store = JsonFileStore::new(&path);

        let err = store.save(&sample_turns()).unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::DeserializeFailed(_)));
    }

    #[test]
    fn test_newer_snapshot_version_rejected() {
        let mut snapshot = TranscriptSnapshot::new(&sample_turns());
        snapshot.version = TranscriptSnapshot::CURRENT_VERSION + 1;
        let json = serde_json::to_string(&snapshot).unwrap();

        let err = TranscriptSnapshot::from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::VersionMismatch { found: 2, .. }
        ));
    }

    #[test]
    fn test_export_json_is_labeled_list() {
        let transcript = Transcript::from_turns(sample_turns());
        let bytes = export_json(&transcript).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["round"], 1);
        assert_eq!(items[0]["agent"], "openai");
        assert_eq!(items[0]["thought"], "2 plus 2");
        assert_eq!(items[2]["answer"], "Still 4");

        let back: Vec<Turn> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, sample_turns());
    }

    #[test]
    fn test_export_markdown_groups_by_round() {
        let md = export_markdown("What is 2+2?", &Transcript::from_turns(sample_turns()));
        assert!(md.starts_with("# What is 2+2?\n"));
        let r1 = md.find("## Round 1").unwrap();
        let r2 = md.find("## Round 2").unwrap();
        assert!(r1 < r2);
        assert!(md.contains("### Claude"));
        assert!(md.contains("> 2 plus 2"));
        assert!(md.contains("**Answer:** Still 4"));
    }
}
