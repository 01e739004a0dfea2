//! Persisted upload state with a single writer
//!
//! [`UploadStateStore`] owns the [`UploadState`] document kept in the
//! key-value store. All mutations are funnelled through one writer task, so
//! saves never interleave:
//!
//! ```text
//!   pipeline tasks ──update()──► mpsc ──► StateWriter ──save_value()──► IKeyValueStore
//!        ▲                                    │
//!        └──────────── snapshot (RwLock) ◄────┘ published after a successful save
//! ```
//!
//! Readers see only states that have been durably saved.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use photolift_core::domain::{ItemState, UploadState};
use photolift_core::ports::IKeyValueStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{Result, UploadError};

/// Pending writes buffered before submitters are suspended
const WRITE_QUEUE_DEPTH: usize = 100;

enum StoreOp {
    Update {
        entries: Vec<(PathBuf, ItemState)>,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Handle to the persisted upload state
///
/// Cheap to clone; every clone talks to the same writer task. The writer
/// stops once all handles are dropped.
#[derive(Clone)]
pub struct UploadStateStore {
    tx: mpsc::Sender<StoreOp>,
    snapshot: Arc<RwLock<UploadState>>,
}

impl UploadStateStore {
    /// Loads the state saved under `key` and starts the writer task
    ///
    /// A missing key yields an empty state.
    pub async fn load(store: Arc<dyn IKeyValueStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let state = match store
            .read_value(&key)
            .await
            .map_err(|e| UploadError::Store(format!("failed to read '{key}': {e:#}")))?
        {
            Some(value) => serde_json::from_value::<UploadState>(value)
                .map_err(|e| UploadError::Store(format!("corrupt state under '{key}': {e}")))?,
            None => UploadState::new(),
        };
        info!(key = %key, entries = state.len(), "Loaded upload state");

        let snapshot = Arc::new(RwLock::new(state.clone()));
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let writer = StateWriter {
            rx,
            store,
            key,
            current: state,
            snapshot: snapshot.clone(),
        };
        tokio::spawn(writer.run());

        Ok(Self { tx, snapshot })
    }

    /// Last saved state of `path`
    pub fn get(&self, path: &Path) -> Option<ItemState> {
        self.snapshot.read().unwrap().get(path).cloned()
    }

    /// Copy of the whole saved state
    pub fn snapshot(&self) -> UploadState {
        self.snapshot.read().unwrap().clone()
    }

    /// Persists the state of one path
    ///
    /// Returns once the new state has been saved.
    pub async fn update(&self, path: &Path, state: ItemState) -> Result<()> {
        self.update_many(vec![(path.to_path_buf(), state)]).await
    }

    /// Persists several paths with a single save
    pub async fn update_many(&self, entries: Vec<(PathBuf, ItemState)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreOp::Update { entries, reply })
            .await
            .map_err(|_| UploadError::Store("state writer has stopped".to_string()))?;
        rx.await
            .map_err(|_| UploadError::Store("state writer response lost".to_string()))?
    }
}

struct StateWriter {
    rx: mpsc::Receiver<StoreOp>,
    store: Arc<dyn IKeyValueStore>,
    key: String,
    current: UploadState,
    snapshot: Arc<RwLock<UploadState>>,
}

impl StateWriter {
    async fn run(mut self) {
        debug!(key = %self.key, "State writer started");
        while let Some(op) = self.rx.recv().await {
            match op {
                StoreOp::Update { entries, reply } => {
                    let result = self.apply(entries).await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!(key = %self.key, "State writer stopped (all handles dropped)");
    }

    async fn apply(&mut self, entries: Vec<(PathBuf, ItemState)>) -> Result<()> {
        let previous: Vec<Option<ItemState>> = entries
            .iter()
            .map(|(path, state)| self.current.insert(path, state.clone()))
            .collect();

        let saved = match serde_json::to_value(&self.current) {
            Ok(value) => self
                .store
                .save_value(&self.key, &value)
                .await
                .map_err(|e| UploadError::Store(format!("failed to save '{}': {e:#}", self.key))),
            Err(e) => Err(UploadError::Store(format!("failed to encode state: {e}"))),
        };

        match saved {
            Ok(()) => {
                let mut snapshot = self.snapshot.write().unwrap();
                for (path, state) in entries {
                    snapshot.insert(&path, state);
                }
                Ok(())
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Rolling back unsaved state");
                for ((path, _), old) in entries.iter().zip(previous) {
                    match old {
                        Some(old) => self.current.insert(path, old),
                        None => self.current.remove(path),
                    };
                }
                Err(e)
            }
        }
    }
}
