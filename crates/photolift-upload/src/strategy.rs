//! When and in what order created items join their album

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use photolift_core::config::AlbumStrategy;
use photolift_core::domain::{AlbumId, ItemState, KeyedError, MediaId, PathState};
use photolift_core::ports::{IPhotosService, RemoteAlbum};
use tracing::{debug, warn};

use crate::batch::{self, CREATE_BATCH_SIZE};
use crate::error::{Result, UploadError};
use crate::retry::{RemoteOperation, RetryPolicy};
use crate::state_store::UploadStateStore;
use crate::worker_pool::WorkerPool;

/// Album attachment policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddToAlbumStrategy {
    /// Items are created directly inside the album
    #[default]
    WhileCreating,
    /// Items are created outside any album, then added in capture-time order
    AfterCreatingSorted,
}

impl From<AlbumStrategy> for AddToAlbumStrategy {
    fn from(strategy: AlbumStrategy) -> Self {
        match strategy {
            AlbumStrategy::WhileCreating => AddToAlbumStrategy::WhileCreating,
            AlbumStrategy::AfterCreatingSorted => AddToAlbumStrategy::AfterCreatingSorted,
        }
    }
}

/// Collaborators needed to attach items after creation
pub struct AttachContext<'a> {
    pub service: &'a Arc<dyn IPhotosService>,
    pub retry: &'a RetryPolicy,
    pub pool: &'a WorkerPool,
    pub store: &'a UploadStateStore,
}

impl AddToAlbumStrategy {
    /// Album to pass to media-item creation
    pub fn creation_album<'a>(&self, album: Option<&'a RemoteAlbum>) -> Option<&'a AlbumId> {
        match self {
            AddToAlbumStrategy::WhileCreating => album.map(|a| &a.id),
            AddToAlbumStrategy::AfterCreatingSorted => None,
        }
    }

    /// Returns true if `state` needs no further remote work
    pub fn is_done(&self, state: &ItemState, album: Option<&RemoteAlbum>) -> bool {
        if state.media_id().is_none() {
            return false;
        }
        match (self, album) {
            (AddToAlbumStrategy::AfterCreatingSorted, Some(album)) => state.is_in_album(&album.id),
            _ => true,
        }
    }

    /// Attaches created items to `album` and returns each item's outcome
    ///
    /// `items` must all carry a media id. A user-correctable failure of a
    /// batch is reported against every path in it; any other failure aborts.
    pub async fn attach(
        &self,
        ctx: &AttachContext<'_>,
        album: Option<&RemoteAlbum>,
        items: Vec<(PathBuf, ItemState)>,
    ) -> Result<Vec<PathState>> {
        let album = match (self, album) {
            (AddToAlbumStrategy::AfterCreatingSorted, Some(album)) => album,
            _ => {
                return Ok(items
                    .into_iter()
                    .map(|(path, state)| PathState::success(path, state))
                    .collect())
            }
        };

        let mut outcomes = Vec::with_capacity(items.len());
        let mut pending = Vec::new();
        for (path, state) in items {
            if state.is_in_album(&album.id) || state.media_id().is_none() {
                outcomes.push(PathState::success(path, state));
            } else {
                pending.push((path, state));
            }
        }
        if pending.is_empty() {
            return Ok(outcomes);
        }

        pending.sort_by(|(a_path, a), (b_path, b)| {
            capture_order(a, b).then_with(|| a_path.cmp(b_path))
        });

        // One add per media id, in sorted order; every path sharing it follows
        let mut order: Vec<MediaId> = Vec::new();
        let mut members: HashMap<MediaId, Vec<(PathBuf, ItemState)>> = HashMap::new();
        for (path, state) in pending {
            let Some(id) = state.media_id().cloned() else {
                continue;
            };
            let group = members.entry(id.clone()).or_default();
            if group.is_empty() {
                order.push(id);
            }
            group.push((path, state));
        }
        debug!(album = %album.id, items = order.len(), "Adding created items to album");

        let members = Mutex::new(members);
        let results = Mutex::new(outcomes);
        let members_ref = &members;
        let results_ref = &results;
        let album_id = &album.id;

        batch::chain(&order, CREATE_BATCH_SIZE, move |ids| async move {
            let service = ctx.service;
            let added = ctx
                .pool
                .run(ctx.retry.with_retry(
                    RemoteOperation::AddToAlbum,
                    album_id.as_str(),
                    move || service.add_items_to_album(album_id, ids),
                ))
                .await;

            let group: Vec<(PathBuf, ItemState)> = {
                let mut members = members_ref.lock().unwrap();
                ids.iter()
                    .flat_map(|id| members.remove(id).unwrap_or_default())
                    .collect()
            };

            match added {
                Ok(()) => {
                    let updated: Vec<(PathBuf, ItemState)> = group
                        .into_iter()
                        .map(|(path, state)| (path, state.with_album(album_id.clone())))
                        .collect();
                    ctx.store.update_many(updated.clone()).await?;
                    results_ref.lock().unwrap().extend(
                        updated
                            .into_iter()
                            .map(|(path, state)| PathState::success(path, state)),
                    );
                    Ok(())
                }
                Err(UploadError::UserCorrectable(message)) => {
                    warn!(album = %album_id, items = group.len(), %message, "Album rejected items");
                    results_ref.lock().unwrap().extend(
                        group
                            .into_iter()
                            .map(|(path, _)| PathState::failure(path, message.clone())),
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await?;

        Ok(results.into_inner().unwrap())
    }
}

/// Orders by capture time, items without one last
fn capture_order(a: &ItemState, b: &ItemState) -> Ordering {
    match (a.captured_at(), b.captured_at()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Failure reports for a set of outcomes
pub fn failures_of(outcomes: &[PathState]) -> Vec<KeyedError> {
    outcomes
        .iter()
        .filter_map(|o| match &o.outcome {
            Err(message) => Some(KeyedError::new(o.path.display().to_string(), message.clone())),
            Ok(_) => None,
        })
        .collect()
}
