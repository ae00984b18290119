//! Checkpoint storage.
//!
//! The orchestrator writes a [`Checkpoint`] at every node boundary. A store
//! only has to return the latest one per thread; durability is the
//! backend's choice.

use crate::error::StateStoreError;
use crate::graph::NodeKind;
use crate::state::ConversationState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use teller_core::ThreadId;
use tokio::sync::RwLock;
use tracing::debug;

/// Snapshot of a thread between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: ThreadId,
    pub state: ConversationState,
    /// Node to run next.
    pub next: NodeKind,
    /// Node transitions taken in this invocation.
    pub step: u32,
    /// Invocation number on this thread, starting at 1.
    pub invocation: u32,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Creates the ENTRY checkpoint of an invocation.
    #[must_use]
    pub fn entry(thread_id: ThreadId, state: ConversationState, invocation: u32) -> Self {
        Self {
            thread_id,
            state,
            next: NodeKind::Entry,
            step: 0,
            invocation,
            saved_at: Utc::now(),
        }
    }

    /// Moves the checkpoint to `next`.
    pub fn advance(&mut self, next: NodeKind) {
        self.next = next;
        self.step += 1;
        self.saved_at = Utc::now();
    }
}

/// Trait for checkpoint persistence.
///
/// Implementations serialize writes per thread; the latest `put` wins.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the latest checkpoint of a thread.
    async fn get(&self, thread_id: ThreadId) -> Result<Option<Checkpoint>, StateStoreError>;

    /// Stores a checkpoint as the thread's latest.
    async fn put(&self, thread_id: ThreadId, checkpoint: Checkpoint) -> Result<(), StateStoreError>;
}

/// In-memory store that keeps every checkpoint of every thread.
///
/// Nothing is ever evicted: memory grows with every step of every
/// invocation, so a long-running process should use [`FileStateStore`].
/// Not durable across process restarts.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    checkpoints: RwLock<HashMap<ThreadId, Vec<Checkpoint>>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all checkpoints of a thread, oldest first.
    pub async fn history(&self, thread_id: ThreadId) -> Vec<Checkpoint> {
        self.checkpoints
            .read()
            .await
            .get(&thread_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of threads with at least one checkpoint.
    pub async fn thread_count(&self) -> usize {
        self.checkpoints.read().await.len()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, thread_id: ThreadId) -> Result<Option<Checkpoint>, StateStoreError> {
        Ok(self
            .checkpoints
            .read()
            .await
            .get(&thread_id)
            .and_then(|history| history.last().cloned()))
    }

    async fn put(&self, thread_id: ThreadId, checkpoint: Checkpoint) -> Result<(), StateStoreError> {
        self.checkpoints
            .write()
            .await
            .entry(thread_id)
            .or_default()
            .push(checkpoint);
        Ok(())
    }
}

/// File-backed store with one JSON document per thread.
///
/// Writes go to a temporary file that is then renamed over the thread's
/// file, so readers never see a partial checkpoint.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread_id: ThreadId) -> PathBuf {
        self.dir.join(format!("{thread_id}.json"))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, thread_id: ThreadId) -> Result<Option<Checkpoint>, StateStoreError> {
        let bytes = match tokio::fs::read(self.path_for(thread_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StateStoreError::ReadFailed {
                    thread_id,
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StateStoreError::Corrupt {
                thread_id,
                reason: e.to_string(),
            })
    }

    async fn put(&self, thread_id: ThreadId, checkpoint: Checkpoint) -> Result<(), StateStoreError> {
        let write_failed = |reason: String| StateStoreError::WriteFailed { thread_id, reason };

        let bytes = serde_json::to_vec_pretty(&checkpoint).map_err(|e| write_failed(e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let path = self.path_for(thread_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!(path = %path.display(), step = checkpoint.step, "checkpoint written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InvocationInput, TurnRecord};
    use serde_json::json;

    fn checkpoint(thread_id: ThreadId) -> Checkpoint {
        let input = InvocationInput::new("c-1", "What is my balance?").with_history(vec![json!({
            "created_at": "2024-01-01T10:00:00Z",
            "sender_type": "customer",
            "content": "Hi"
        })]);
        let mut state = ConversationState::new(input);
        state.turn_log.push(TurnRecord::model("Your balance is USD 120.50.", vec![]));
        state.resolved_identifiers.record("accounts", ["a-1".to_string()]);
        Checkpoint::entry(thread_id, state, 1)
    }

    #[tokio::test]
    async fn in_memory_store_returns_latest_and_keeps_history() {
        let store = InMemoryStateStore::new();
        let thread_id = ThreadId::new();
        assert_eq!(store.get(thread_id).await.unwrap(), None);

        let mut cp = checkpoint(thread_id);
        store.put(thread_id, cp.clone()).await.unwrap();
        cp.advance(NodeKind::Summarize);
        store.put(thread_id, cp.clone()).await.unwrap();

        let latest = store.get(thread_id).await.unwrap().expect("checkpoint");
        assert_eq!(latest.next, NodeKind::Summarize);
        assert_eq!(latest.step, 1);

        let history: Vec<NodeKind> = store.history(thread_id).await.iter().map(|c| c.next).collect();
        assert_eq!(history, vec![NodeKind::Entry, NodeKind::Summarize]);
    }

    #[tokio::test]
    async fn in_memory_store_isolates_threads() {
        let store = InMemoryStateStore::new();
        let (a, b) = (ThreadId::new(), ThreadId::new());

        store.put(a, checkpoint(a)).await.unwrap();
        assert_eq!(store.get(b).await.unwrap(), None);
        assert_eq!(store.thread_count().await, 1);
    }

    #[tokio::test]
    async fn file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let thread_id = ThreadId::new();
        let mut cp = checkpoint(thread_id);
        cp.advance(NodeKind::Answer);

        FileStateStore::new(dir.path().join("threads"))
            .put(thread_id, cp.clone())
            .await
            .expect("put");

        let reopened = FileStateStore::new(dir.path().join("threads"));
        let loaded = reopened.get(thread_id).await.expect("get").expect("checkpoint");
        assert_eq!(loaded, cp);
        assert!(reopened.get(ThreadId::new()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn file_store_overwrites_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStateStore::new(dir.path());
        let thread_id = ThreadId::new();
        let mut cp = checkpoint(thread_id);

        store.put(thread_id, cp.clone()).await.expect("put");
        cp.advance(NodeKind::Summarize);
        store.put(thread_id, cp.clone()).await.expect("put");

        assert_eq!(store.get(thread_id).await.expect("get").map(|c| c.next), Some(NodeKind::Summarize));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).expect("read_dir").collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_checkpoints() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStateStore::new(dir.path());
        let thread_id = ThreadId::new();
        std::fs::write(store.path_for(thread_id), b"{not json").expect("write");

        assert!(matches!(
            store.get(thread_id).await,
            Err(StateStoreError::Corrupt { .. })
        ));
    }
}
