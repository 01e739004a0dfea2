//! Album resolution and duplicate-album merging
//!
//! Every titled directory needs exactly one writable remote album. The
//! reconciler picks it from the albums already in the library, creating one
//! when none is usable. When several writable albums share a title their
//! contents are merged into a single primary album:
//!
//! ```text
//!   "Trip" (A, 3 items)   "Trip" (B, 2 items)   "Trip" (C, empty)
//!          │                      │
//!          │◄── add B − A ────────┤
//!          │                      └── remove all of B's items
//!          ▼
//!   primary A; B and C reported for manual deletion
//! ```
//!
//! The service offers no album deletion, so emptied and duplicate albums are
//! reported to the user instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use photolift_core::domain::{AlbumDirectory, AlbumId, KeyedError, MediaId};
use photolift_core::ports::{IPhotosService, IProgressSink, RemoteAlbum};
use tracing::{debug, info, warn};

use crate::batch::{self, ALBUM_EDIT_BATCH_SIZE};
use crate::error::{Result, UploadError};
use crate::retry::{BackoffState, RemoteOperation, RetryPolicy};
use crate::worker_pool::WorkerPool;

/// Outcome of reconciling directory titles with remote albums
#[derive(Debug, Default)]
pub struct AlbumResolution {
    /// Album to upload into, by title
    pub albums: HashMap<String, RemoteAlbum>,
    /// Duplicate albums the user should delete by hand
    pub manual_deletions: Vec<KeyedError>,
}

/// Resolves album titles to remote albums
#[derive(Clone)]
pub struct AlbumReconciler {
    service: Arc<dyn IPhotosService>,
    retry: RetryPolicy,
    pool: WorkerPool,
    progress: Arc<dyn IProgressSink>,
}

impl AlbumReconciler {
    pub fn new(
        service: Arc<dyn IPhotosService>,
        retry: RetryPolicy,
        pool: WorkerPool,
        progress: Arc<dyn IProgressSink>,
    ) -> Self {
        Self {
            service,
            retry,
            pool,
            progress,
        }
    }

    /// Lists the library's albums grouped by title, in listing order
    pub async fn list_remote_albums(&self) -> Result<HashMap<String, Vec<RemoteAlbum>>> {
        let service = &self.service;
        let report: &(dyn Fn(usize) + Send + Sync) =
            &|count| debug!(count, "Listing remote albums");

        let albums = self
            .pool
            .run(
                self.retry
                    .with_retry(RemoteOperation::ListAlbums, "albums", move || {
                        service.list_albums(report)
                    }),
            )
            .await?;
        info!(count = albums.len(), "Listed remote albums");

        let mut by_title: HashMap<String, Vec<RemoteAlbum>> = HashMap::new();
        for album in albums {
            by_title.entry(album.title.clone()).or_default().push(album);
        }
        Ok(by_title)
    }

    /// Picks, creates or merges one writable album per directory title
    ///
    /// Manual-deletion reports are sent to the progress sink as well as
    /// returned.
    pub async fn reconcile(
        &self,
        directories: &[AlbumDirectory],
        remote_by_title: &HashMap<String, Vec<RemoteAlbum>>,
    ) -> Result<AlbumResolution> {
        let mut resolution = AlbumResolution::default();

        for title in directories.iter().filter_map(AlbumDirectory::title) {
            if resolution.albums.contains_key(title) {
                continue;
            }
            let candidates = remote_by_title
                .get(title)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let album = self
                .resolve_title(title, candidates, &mut resolution.manual_deletions)
                .await?;
            resolution.albums.insert(title.to_string(), album);
        }

        for report in &resolution.manual_deletions {
            self.progress.add_failure(report.clone());
        }
        Ok(resolution)
    }

    async fn resolve_title(
        &self,
        title: &str,
        candidates: &[RemoteAlbum],
        manual_deletions: &mut Vec<KeyedError>,
    ) -> Result<RemoteAlbum> {
        let writable: Vec<&RemoteAlbum> = candidates.iter().filter(|a| a.writable).collect();

        let (mut primary, merge_sources) = match writable.as_slice() {
            [] => return self.create_album(title).await,
            [only] => return Ok((*only).clone()),
            _ => {
                let non_empty: Vec<&RemoteAlbum> =
                    writable.iter().copied().filter(|a| a.item_count > 0).collect();
                match non_empty.as_slice() {
                    [] => (writable[0].clone(), Vec::new()),
                    [first, rest @ ..] => ((*first).clone(), rest.to_vec()),
                }
            }
        };

        if !merge_sources.is_empty() {
            info!(
                title,
                primary = %primary.id,
                sources = merge_sources.len(),
                "Merging duplicate albums"
            );
            let added = self.merge(&primary, &merge_sources).await?;
            primary.item_count += added as u64;
        }

        for duplicate in writable.iter().filter(|a| a.id != primary.id) {
            warn!(title, album = %duplicate.id, "Duplicate album left for manual deletion");
            manual_deletions.push(KeyedError::new(
                duplicate.report_key(),
                format!(
                    "Duplicate album '{title}' is no longer used (items live in {}); delete it manually",
                    primary.report_key()
                ),
            ));
        }
        Ok(primary)
    }

    async fn create_album(&self, title: &str) -> Result<RemoteAlbum> {
        let service = &self.service;
        let album = self
            .pool
            .run(
                self.retry
                    .with_retry(RemoteOperation::CreateAlbum, title, move || {
                        service.create_album(title)
                    }),
            )
            .await?;
        info!(title, album = %album.id, "Created album");
        Ok(album)
    }

    /// Moves the items of every source album into `primary`
    ///
    /// Returns the number of items newly added to `primary`. All calls share
    /// one backoff state.
    pub async fn merge(&self, primary: &RemoteAlbum, sources: &[&RemoteAlbum]) -> Result<usize> {
        let mut state = self.retry.new_state();
        let mut primary_items: HashSet<MediaId> = self
            .list_items(&primary.id, &mut state)
            .await?
            .into_iter()
            .collect();
        let mut added = 0;

        for source in sources {
            let source_items = self.list_items(&source.id, &mut state).await?;
            let mut to_add = Vec::new();
            for id in &source_items {
                if primary_items.insert(id.clone()) {
                    to_add.push(id.clone());
                }
            }
            debug!(
                source = %source.id,
                items = source_items.len(),
                to_add = to_add.len(),
                "Merging album"
            );

            self.edit_album(RemoteOperation::AddToAlbum, &primary.id, &to_add, &mut state)
                .await?;
            added += to_add.len();
            self.edit_album(
                RemoteOperation::RemoveFromAlbum,
                &source.id,
                &source_items,
                &mut state,
            )
            .await?;
        }
        Ok(added)
    }

    async fn list_items(&self, album: &AlbumId, state: &mut BackoffState) -> Result<Vec<MediaId>> {
        let service = &self.service;
        self.pool
            .run(self.retry.with_retry_state(
                state,
                RemoteOperation::ListAlbumItems,
                album.as_str(),
                move || service.list_album_items(album),
            ))
            .await
    }

    /// Adds or removes `items` in sub-batches, falling back to one call per
    /// item when a sub-batch is rejected as user-correctable
    async fn edit_album(
        &self,
        operation: RemoteOperation,
        album: &AlbumId,
        items: &[MediaId],
        state: &mut BackoffState,
    ) -> Result<()> {
        for chunk in batch::split(items, ALBUM_EDIT_BATCH_SIZE) {
            match self.edit_call(operation, album, chunk, state).await {
                Ok(()) => {}
                Err(UploadError::UserCorrectable(message)) => {
                    warn!(%operation, album = %album, items = chunk.len(), %message, "Batch rejected, retrying items one by one");
                    for item in chunk {
                        match self
                            .edit_call(operation, album, std::slice::from_ref(item), state)
                            .await
                        {
                            Ok(()) => {}
                            Err(UploadError::UserCorrectable(message)) => {
                                warn!(%operation, album = %album, item = %item, %message, "Skipping item");
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn edit_call(
        &self,
        operation: RemoteOperation,
        album: &AlbumId,
        items: &[MediaId],
        state: &mut BackoffState,
    ) -> Result<()> {
        let service = &self.service;
        self.pool
            .run(
                self.retry
                    .with_retry_state(state, operation, album.as_str(), move || async move {
                        match operation {
                            RemoteOperation::RemoveFromAlbum => {
                                service.remove_items_from_album(album, items).await
                            }
                            _ => service.add_items_to_album(album, items).await,
                        }
                    }),
            )
            .await
    }
}
