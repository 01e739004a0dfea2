//! Per-file upload state machine
//!
//! [`UploadPipeline`] moves each file of a directory through three stages:
//!
//! 1. **Binary upload** for files without a live upload token
//! 2. **Media-item creation** for files with a token but no media id, one
//!    call per batch of 50
//! 3. **Album attachment** according to the [`AddToAlbumStrategy`], once
//!    for the whole directory after every batch has been created
//!
//! Every transition is saved before the next stage starts, so a restarted
//! run resumes where the previous one stopped.
//!
//! ## In-flight slots
//!
//! Each path maps to one slot: an async mutex holding the in-memory state of
//! that file. A directory locks all of its slots (in path order) before
//! deciding what is left to do, and holds them until attachment is over.
//! Concurrent uploads of the same path therefore run one after the other,
//! and the second finds the work already done.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use photolift_core::domain::{ItemPhase, ItemState, KeyedError, PathState, UploadedBinary};
use photolift_core::ports::{IPhotosService, IProgressSink, NewMediaItem, RemoteAlbum};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::batch::{self, CREATE_BATCH_SIZE};
use crate::drive_space::DriveSpaceGuard;
use crate::error::{Result, UploadError};
use crate::retry::{RemoteOperation, RetryPolicy};
use crate::state_store::UploadStateStore;
use crate::strategy::{AddToAlbumStrategy, AttachContext};
use crate::worker_pool::WorkerPool;

type Slot = Arc<Mutex<ItemState>>;

/// One locked file of a batch
struct LockedItem {
    path: PathBuf,
    state: OwnedMutexGuard<ItemState>,
    /// Nothing was left to do when the slot was locked
    done_at_start: bool,
    failure: Option<String>,
}

/// Drives files through upload, creation and attachment
pub struct UploadPipeline {
    service: Arc<dyn IPhotosService>,
    store: UploadStateStore,
    pool: WorkerPool,
    retry: RetryPolicy,
    guard: Arc<DriveSpaceGuard>,
    strategy: AddToAlbumStrategy,
    progress: Arc<dyn IProgressSink>,
    in_flight: DashMap<PathBuf, Slot>,
}

impl UploadPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service: Arc<dyn IPhotosService>,
        store: UploadStateStore,
        pool: WorkerPool,
        retry: RetryPolicy,
        guard: Arc<DriveSpaceGuard>,
        strategy: AddToAlbumStrategy,
        progress: Arc<dyn IProgressSink>,
    ) -> Self {
        Self {
            service,
            store,
            pool,
            retry,
            guard,
            strategy,
            progress,
            in_flight: DashMap::new(),
        }
    }

    pub fn strategy(&self) -> AddToAlbumStrategy {
        self.strategy
    }

    pub fn store(&self) -> &UploadStateStore {
        &self.store
    }

    /// Uploads `files` into `album` (or into no album for `None`)
    ///
    /// Returns one [`PathState`] per distinct path. User-correctable failures
    /// are part of the result; any other failure aborts the directory after
    /// saving what already succeeded.
    pub async fn upload_directory(
        &self,
        album: Option<&RemoteAlbum>,
        files: &[PathBuf],
    ) -> Result<Vec<PathState>> {
        let mut paths = files.to_vec();
        paths.sort();
        paths.dedup();

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let state = self.slot(&path).lock_owned().await;
            let done_at_start = self.strategy.is_done(&state, album);
            items.push(LockedItem {
                path,
                state,
                done_at_start,
                failure: None,
            });
        }

        let outcomes = batch::parallel(&mut items, CREATE_BATCH_SIZE, |chunk| {
            self.create_batch(album, chunk)
        })
        .await;
        let created = match outcomes.into_iter().find_map(|outcome| outcome.err()) {
            Some(e) => Err(e),
            None => self.attach(album, &mut items).await,
        };
        let states = match created {
            Ok(states) => states,
            Err(e) => {
                error!(album = ?album.map(|a| &a.title), error = %e, "Directory upload aborted");
                return Err(e);
            }
        };

        for (item, outcome) in items.iter().zip(&states) {
            if item.done_at_start {
                continue;
            }
            match &outcome.outcome {
                Ok(_) => self.progress.increment_success(),
                Err(message) => self
                    .progress
                    .add_failure(KeyedError::new(item.path.display().to_string(), message.clone())),
            }
        }
        Ok(states)
    }

    fn slot(&self, path: &Path) -> Slot {
        self.in_flight
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(self.store.get(path).unwrap_or_default())))
            .clone()
    }

    /// Uploads and creates one batch of at most 50 locked files
    async fn create_batch(
        &self,
        album: Option<&RemoteAlbum>,
        items: &mut [LockedItem],
    ) -> Result<()> {
        self.upload_binaries(items).await?;
        self.create_media_items(album, items).await
    }

    // ------------------------------------------------------------------
    // Stage 1: binary upload
    // ------------------------------------------------------------------

    async fn upload_binaries(&self, items: &mut [LockedItem]) -> Result<()> {
        let now = Utc::now();
        let results = join_all(
            items
                .iter_mut()
                .filter(|item| item.state.phase_at(now) == ItemPhase::Unstarted)
                .map(|item| async move {
                    let result = self.upload_one(&item.path, &mut item.state).await;
                    (item, result)
                }),
        )
        .await;

        let mut fatal = None;
        for (item, result) in results {
            match result {
                Ok(()) => {}
                Err(UploadError::UserCorrectable(message)) => {
                    warn!(path = %item.path.display(), %message, "Upload rejected");
                    item.failure = Some(message);
                }
                Err(e) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }
        fatal.map_or(Ok(()), Err)
    }

    async fn upload_one(&self, path: &Path, state: &mut ItemState) -> Result<()> {
        self.guard.before_upload().await?;

        let service = &self.service;
        let label = path.display().to_string();
        let token = self
            .pool
            .run(
                self.retry
                    .with_retry(RemoteOperation::UploadBinary, &label, move || {
                        service.upload_binary(path)
                    }),
            )
            .await?;

        let next = state
            .clone()
            .with_upload(UploadedBinary::new(token, Utc::now()));
        self.store.update(path, next.clone()).await?;
        *state = next;
        debug!(path = %label, "Uploaded binary");

        let bytes = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!(path = %label, error = %e, "Cannot read file size; not counted against drive space");
                0
            }
        };
        self.guard.after_upload(bytes).await
    }

    // ------------------------------------------------------------------
    // Stage 2: media-item creation
    // ------------------------------------------------------------------

    async fn create_media_items(
        &self,
        album: Option<&RemoteAlbum>,
        items: &mut [LockedItem],
    ) -> Result<()> {
        let now = Utc::now();
        let mut pending: Vec<&mut LockedItem> = Vec::new();
        let mut requests = Vec::new();
        for item in items.iter_mut() {
            if item.failure.is_some() || item.state.phase_at(now) != ItemPhase::DataUploaded {
                continue;
            }
            let Some(token) = item.state.live_token_at(now).cloned() else {
                continue;
            };
            requests.push(NewMediaItem {
                token,
                file_name: item
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
            pending.push(item);
        }
        if requests.is_empty() {
            return Ok(());
        }

        let album_id = self.strategy.creation_album(album);
        let service = &self.service;
        let requests = &requests;
        let label = format!("{} items", requests.len());
        let response = self
            .pool
            .run(
                self.retry
                    .with_retry(RemoteOperation::CreateMediaItems, &label, move || {
                        service.create_media_items(album_id, requests)
                    }),
            )
            .await;

        let results = match response {
            Ok(results) => results,
            Err(UploadError::UserCorrectable(message)) => {
                warn!(items = pending.len(), %message, "Media item creation rejected");
                for item in pending {
                    item.failure = Some(message.clone());
                }
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if results.len() != requests.len() {
            return Err(UploadError::InvalidResponse {
                operation: RemoteOperation::CreateMediaItems,
                message: format!(
                    "expected {} results, got {}",
                    requests.len(),
                    results.len()
                ),
            });
        }

        let mut updates = Vec::new();
        let mut created = Vec::new();
        for (item, result) in pending.into_iter().zip(results) {
            match result {
                Ok(media) => {
                    let mut next = item.state.clone().with_media(media.id, media.creation_time);
                    if let Some(album_id) = album_id {
                        next = next.with_album(album_id.clone());
                    }
                    updates.push((item.path.clone(), next.clone()));
                    created.push((item, next));
                }
                Err(e) => {
                    warn!(path = %item.path.display(), error = %e, "Media item not created");
                    item.failure = Some(e.to_string());
                }
            }
        }

        self.store.update_many(updates).await?;
        info!(created = created.len(), album = ?album_id, "Created media items");
        for (item, next) in created {
            *item.state = next;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stage 3: album attachment
    // ------------------------------------------------------------------

    async fn attach(
        &self,
        album: Option<&RemoteAlbum>,
        items: &mut [LockedItem],
    ) -> Result<Vec<PathState>> {
        let created: Vec<(PathBuf, ItemState)> = items
            .iter()
            .filter(|item| item.failure.is_none() && item.state.media_id().is_some())
            .map(|item| (item.path.clone(), item.state.clone()))
            .collect();

        let ctx = AttachContext {
            service: &self.service,
            retry: &self.retry,
            pool: &self.pool,
            store: &self.store,
        };
        let attached = self.strategy.attach(&ctx, album, created).await?;
        let mut by_path: HashMap<PathBuf, std::result::Result<ItemState, String>> = attached
            .into_iter()
            .map(|state| (state.path, state.outcome))
            .collect();

        let mut states = Vec::with_capacity(items.len());
        for item in items.iter_mut() {
            let outcome = match (item.failure.take(), by_path.remove(&item.path)) {
                (Some(message), _) => Err(message),
                (None, Some(Ok(state))) => {
                    *item.state = state.clone();
                    Ok(state)
                }
                (None, Some(Err(message))) => Err(message),
                (None, None) => Err("media item was not created".to_string()),
            };
            states.push(PathState {
                path: item.path.clone(),
                outcome,
            });
        }
        Ok(states)
    }
}
