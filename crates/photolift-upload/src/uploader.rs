//! Top-level upload orchestration
//!
//! ```text
//!   AlbumDirectory[] ──► list albums ──► reconcile titles ──► sort files
//!                                                               │
//!        UploadSummary ◄── collect outcomes ◄── UploadPipeline per directory
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::stream::{self, StreamExt};
use photolift_core::config::{Config, SortKey};
use photolift_core::domain::{AlbumDirectory, KeyedError};
use photolift_core::ports::{IPhotosService, IProgressSink, IQuotaService, RemoteAlbum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::album::AlbumReconciler;
use crate::drive_space::DriveSpaceGuard;
use crate::error::{Result, UploadError};
use crate::pipeline::UploadPipeline;
use crate::retry::{BackoffSettings, RetryPolicy};
use crate::state_store::UploadStateStore;
use crate::strategy::{failures_of, AddToAlbumStrategy};
use crate::worker_pool::WorkerPool;

/// Result of a completed run
///
/// A run that finished with failures is still `Ok`; the failures list what
/// the user needs to look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Files uploaded (in this or an earlier run)
    pub succeeded: usize,
    pub failures: Vec<KeyedError>,
}

impl UploadSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Uploads directory trees into albums
pub struct Uploader {
    reconciler: AlbumReconciler,
    pipeline: UploadPipeline,
    progress: Arc<dyn IProgressSink>,
    sort_key: SortKey,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Uploader {
    /// Wires the engine from `config`
    pub fn new(
        service: Arc<dyn IPhotosService>,
        quota: Arc<dyn IQuotaService>,
        store: UploadStateStore,
        progress: Arc<dyn IProgressSink>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        let pool = WorkerPool::new(config.upload.effective_worker_threads());
        let retry = RetryPolicy::new(
            BackoffSettings::from(&config.retry),
            progress.clone(),
            cancel.clone(),
        );
        let guard = Arc::new(DriveSpaceGuard::from_config(quota, &config.drive_space));
        let reconciler =
            AlbumReconciler::new(service.clone(), retry.clone(), pool.clone(), progress.clone());
        let concurrency = pool.size();
        let pipeline = UploadPipeline::new(
            service,
            store,
            pool,
            retry,
            guard,
            AddToAlbumStrategy::from(config.upload.album_strategy),
            progress.clone(),
        );

        Self {
            reconciler,
            pipeline,
            progress,
            sort_key: config.upload.sort_key,
            concurrency,
            cancel,
        }
    }

    /// Uploads every directory and closes the progress sink
    pub async fn upload(&self, directories: &[AlbumDirectory]) -> Result<UploadSummary> {
        let result = self.run(directories).await;
        match &result {
            Ok(summary) => {
                info!(
                    succeeded = summary.succeeded,
                    failures = summary.failures.len(),
                    "Upload finished"
                );
                self.progress.close(summary.is_complete());
            }
            Err(e) => {
                error!(error = %e, "Upload aborted");
                self.progress.close(false);
            }
        }
        result
    }

    async fn run(&self, directories: &[AlbumDirectory]) -> Result<UploadSummary> {
        let resolution = if directories.iter().any(|d| !d.is_root()) {
            let by_title = self.reconciler.list_remote_albums().await?;
            self.reconciler.reconcile(directories, &by_title).await?
        } else {
            Default::default()
        };

        let mut plans = Vec::with_capacity(directories.len());
        let snapshot = self.pipeline.store().snapshot();
        let mut already_done = 0;
        for directory in directories {
            let album = directory
                .title()
                .and_then(|title| resolution.albums.get(title));
            let files = sort_files(directory.files(), self.sort_key).await;
            already_done += files
                .iter()
                .filter(|path| {
                    snapshot
                        .get(path)
                        .is_some_and(|state| self.pipeline.strategy().is_done(state, album))
                })
                .count();
            plans.push((directory, album, files));
        }
        if already_done > 0 {
            info!(already_done, "Files already uploaded by an earlier run");
            self.progress.update_success(already_done);
        }

        let outcomes: Vec<Option<Result<_>>> = stream::iter(plans)
            .map(|(directory, album, files)| async move {
                if self.cancel.is_cancelled() {
                    warn!(path = %directory.path().display(), "Skipping directory after cancellation");
                    return None;
                }
                Some(self.upload_one(directory, album, files).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = UploadSummary {
            succeeded: 0,
            failures: resolution.manual_deletions,
        };
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                None => cancelled = true,
                Some(Ok(states)) => {
                    summary.succeeded += states.iter().filter(|s| s.is_success()).count();
                    summary.failures.extend(failures_of(&states));
                }
                Some(Err(e)) => return Err(e),
            }
        }
        if cancelled {
            return Err(UploadError::Cancelled);
        }
        Ok(summary)
    }

    async fn upload_one(
        &self,
        directory: &AlbumDirectory,
        album: Option<&RemoteAlbum>,
        files: Vec<PathBuf>,
    ) -> Result<Vec<photolift_core::domain::PathState>> {
        info!(
            path = %directory.path().display(),
            album = ?directory.title(),
            files = files.len(),
            "Uploading directory"
        );
        self.pipeline.upload_directory(album, &files).await
    }
}

/// Orders a directory's files by `key`, ties broken by path
pub async fn sort_files(files: &[PathBuf], key: SortKey) -> Vec<PathBuf> {
    let mut files = files.to_vec();
    match key {
        SortKey::Path => files.sort(),
        SortKey::FileName => files.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b))),
        SortKey::ModifiedTime => {
            let mut keyed: Vec<(Option<SystemTime>, PathBuf)> = Vec::with_capacity(files.len());
            for path in files {
                let modified = tokio::fs::metadata(&path)
                    .await
                    .and_then(|m| m.modified())
                    .ok();
                keyed.push((modified, path));
            }
            keyed.sort_by(|(a_time, a), (b_time, b)| match (a_time, b_time) {
                (Some(x), Some(y)) => x.cmp(y).then_with(|| a.cmp(b)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(b),
            });
            return keyed.into_iter().map(|(_, path)| path).collect();
        }
    }
    files
}
