//! Shared test helpers for upload engine integration tests
//!
//! [`FakePhotosService`] keeps a whole photo library in memory. Uploaded
//! tokens map to file contents; creating an item from content the library
//! already holds fails with `ALREADY_EXISTS`, as the real service does for
//! duplicates. Failures can be injected per operation.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use photolift_core::config::Config;
use photolift_core::domain::{AlbumDirectory, AlbumId, MediaId, UploadToken};
use photolift_core::ports::{
    IKeyValueStore, IPhotosService, IQuotaService, NewMediaItem, ProgressCounter, Quota,
    RemoteAlbum, RemoteError, RemoteMediaItem, RemoteResult, StatusCode,
};
use photolift_upload::drive_space::DriveSpaceGuard;
use photolift_upload::pipeline::UploadPipeline;
use photolift_upload::retry::{BackoffSettings, RetryPolicy};
use photolift_upload::worker_pool::WorkerPool;
use photolift_upload::{AddToAlbumStrategy, UploadStateStore, Uploader};

// ============================================================================
// Fake photo library
// ============================================================================

/// Remote call kinds, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    UploadBinary,
    CreateMediaItems,
    CreateAlbum,
    ListAlbums,
    ListAlbumItems,
    AddToAlbum,
    RemoveFromAlbum,
}

#[derive(Debug, Clone)]
pub struct FakeAlbum {
    pub album: RemoteAlbum,
    pub items: Vec<MediaId>,
}

#[derive(Default)]
struct Library {
    next_id: u64,
    tokens: HashMap<String, Vec<u8>>,
    by_content: HashMap<Vec<u8>, MediaId>,
    items: HashSet<MediaId>,
    albums: Vec<FakeAlbum>,
    failures: HashMap<Call, VecDeque<Option<RemoteError>>>,
    rejected: HashSet<MediaId>,
    calls: HashMap<Call, usize>,
    batch_sizes: HashMap<Call, Vec<usize>>,
    creation_albums: Vec<Option<AlbumId>>,
    /// Local files are removed once their bytes are uploaded
    moves_files: bool,
}

impl Library {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn begin(&mut self, call: Call) -> RemoteResult<()> {
        *self.calls.entry(call).or_default() += 1;
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(Some(error)) => Err(error),
            _ => Ok(()),
        }
    }

    fn album_mut(&mut self, id: &AlbumId) -> RemoteResult<&mut FakeAlbum> {
        self.albums
            .iter_mut()
            .find(|a| &a.album.id == id)
            .ok_or_else(|| RemoteError::new(StatusCode::NotFound, format!("no album {id}")))
    }
}

/// In-memory photo library
#[derive(Default)]
pub struct FakePhotosService {
    library: Mutex<Library>,
}

impl FakePhotosService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next calls of kind `call` fail with `codes`, in order
    pub fn fail_next(&self, call: Call, codes: &[StatusCode]) {
        let mut library = self.library.lock().unwrap();
        let queue = library.failures.entry(call).or_default();
        for code in codes {
            queue.push_back(Some(RemoteError::new(*code, "injected")));
        }
    }

    /// Lets the next `count` calls of kind `call` through before any
    /// failure queued after them
    pub fn pass_next(&self, call: Call, count: usize) {
        let mut library = self.library.lock().unwrap();
        let queue = library.failures.entry(call).or_default();
        queue.extend(std::iter::repeat_with(|| None).take(count));
    }

    /// Deletes each local file right after its binary upload
    pub fn move_uploaded_files(&self) {
        self.library.lock().unwrap().moves_files = true;
    }

    /// Album edits involving `id` are rejected as invalid
    pub fn reject_item(&self, id: &MediaId) {
        self.library.lock().unwrap().rejected.insert(id.clone());
    }

    /// Adds an item that exists only remotely
    pub fn seed_item(&self) -> MediaId {
        let mut library = self.library.lock().unwrap();
        let id = MediaId::new(library.next("seed")).unwrap();
        library.items.insert(id.clone());
        id
    }

    /// Adds an album holding `items`
    pub fn seed_album(&self, title: &str, writable: bool, items: Vec<MediaId>) -> AlbumId {
        let mut library = self.library.lock().unwrap();
        let id = AlbumId::new(library.next("album")).unwrap();
        library.albums.push(FakeAlbum {
            album: RemoteAlbum {
                id: id.clone(),
                title: title.to_string(),
                writable,
                item_count: items.len() as u64,
                product_url: Some(format!("https://photos.example/{id}")),
            },
            items,
        });
        id
    }

    pub fn albums_titled(&self, title: &str) -> Vec<FakeAlbum> {
        self.library
            .lock()
            .unwrap()
            .albums
            .iter()
            .filter(|a| a.album.title == title)
            .cloned()
            .collect()
    }

    pub fn album_items(&self, id: &AlbumId) -> Vec<MediaId> {
        self.library
            .lock()
            .unwrap()
            .albums
            .iter()
            .find(|a| &a.album.id == id)
            .map(|a| a.items.clone())
            .unwrap_or_default()
    }

    pub fn item_count(&self) -> usize {
        self.library.lock().unwrap().items.len()
    }

    pub fn calls(&self, call: Call) -> usize {
        self.library
            .lock()
            .unwrap()
            .calls
            .get(&call)
            .copied()
            .unwrap_or(0)
    }

    /// Request sizes of every call of kind `call`, including failed ones
    pub fn batch_sizes(&self, call: Call) -> Vec<usize> {
        self.library
            .lock()
            .unwrap()
            .batch_sizes
            .get(&call)
            .cloned()
            .unwrap_or_default()
    }

    /// Album argument of every creation call
    pub fn creation_albums(&self) -> Vec<Option<AlbumId>> {
        self.library.lock().unwrap().creation_albums.clone()
    }

    fn record_batch(&self, call: Call, size: usize) {
        self.library
            .lock()
            .unwrap()
            .batch_sizes
            .entry(call)
            .or_default()
            .push(size);
    }
}

#[async_trait::async_trait]
impl IPhotosService for FakePhotosService {
    async fn upload_binary(&self, path: &Path) -> RemoteResult<UploadToken> {
        self.library.lock().unwrap().begin(Call::UploadBinary)?;
        let content = tokio::fs::read(path).await.map_err(|e| {
            RemoteError::new(StatusCode::InvalidArgument, format!("unreadable file: {e}"))
        })?;

        let moves_files = self.library.lock().unwrap().moves_files;
        if moves_files {
            tokio::fs::remove_file(path).await.unwrap();
        }

        let mut library = self.library.lock().unwrap();
        let token = library.next("token");
        library.tokens.insert(token.clone(), content);
        Ok(UploadToken::new(token).unwrap())
    }

    async fn create_media_items(
        &self,
        album: Option<&AlbumId>,
        items: &[NewMediaItem],
    ) -> RemoteResult<Vec<RemoteResult<RemoteMediaItem>>> {
        self.record_batch(Call::CreateMediaItems, items.len());
        let mut library = self.library.lock().unwrap();
        library.begin(Call::CreateMediaItems)?;
        library.creation_albums.push(album.cloned());
        if items.len() > 50 {
            return Err(RemoteError::new(StatusCode::InvalidArgument, "too many items"));
        }
        if let Some(album) = album {
            library.album_mut(album)?;
        }

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Some(content) = library.tokens.get(item.token.as_str()).cloned() else {
                results.push(Err(RemoteError::new(
                    StatusCode::InvalidArgument,
                    "unknown upload token",
                )));
                continue;
            };
            if library.by_content.contains_key(&content) {
                results.push(Err(RemoteError::new(
                    StatusCode::AlreadyExists,
                    format!("{} is already in the library", item.file_name),
                )));
                continue;
            }

            let id = MediaId::new(library.next("media")).unwrap();
            library.by_content.insert(content, id.clone());
            library.items.insert(id.clone());
            if let Some(album) = album {
                library.album_mut(album)?.items.push(id.clone());
            }
            results.push(Ok(RemoteMediaItem {
                id,
                filename: item.file_name.clone(),
                creation_time: Some(capture_time(index)),
            }));
        }
        Ok(results)
    }

    async fn create_album(&self, title: &str) -> RemoteResult<RemoteAlbum> {
        self.library.lock().unwrap().begin(Call::CreateAlbum)?;
        let id = self.seed_album(title, true, Vec::new());
        Ok(self
            .albums_titled(title)
            .into_iter()
            .find(|a| a.album.id == id)
            .map(|a| a.album)
            .unwrap())
    }

    async fn list_albums(
        &self,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> RemoteResult<Vec<RemoteAlbum>> {
        let albums: Vec<RemoteAlbum> = {
            let mut library = self.library.lock().unwrap();
            library.begin(Call::ListAlbums)?;
            library
                .albums
                .iter()
                .map(|a| RemoteAlbum {
                    item_count: a.items.len() as u64,
                    ..a.album.clone()
                })
                .collect()
        };
        progress(albums.len());
        Ok(albums)
    }

    async fn list_album_items(&self, album: &AlbumId) -> RemoteResult<Vec<MediaId>> {
        let mut library = self.library.lock().unwrap();
        library.begin(Call::ListAlbumItems)?;
        Ok(library.album_mut(album)?.items.clone())
    }

    async fn add_items_to_album(&self, album: &AlbumId, items: &[MediaId]) -> RemoteResult<()> {
        self.record_batch(Call::AddToAlbum, items.len());
        let mut library = self.library.lock().unwrap();
        library.begin(Call::AddToAlbum)?;
        check_edit(&library, items)?;
        let target = library.album_mut(album)?;
        for id in items {
            if !target.items.contains(id) {
                target.items.push(id.clone());
            }
        }
        Ok(())
    }

    async fn remove_items_from_album(
        &self,
        album: &AlbumId,
        items: &[MediaId],
    ) -> RemoteResult<()> {
        self.record_batch(Call::RemoveFromAlbum, items.len());
        let mut library = self.library.lock().unwrap();
        library.begin(Call::RemoveFromAlbum)?;
        check_edit(&library, items)?;
        library
            .album_mut(album)?
            .items
            .retain(|id| !items.contains(id));
        Ok(())
    }
}

fn check_edit(library: &Library, items: &[MediaId]) -> RemoteResult<()> {
    if items.len() > 50 {
        return Err(RemoteError::new(StatusCode::InvalidArgument, "too many items"));
    }
    if let Some(id) = items.iter().find(|id| library.rejected.contains(*id)) {
        return Err(RemoteError::new(
            StatusCode::InvalidArgument,
            format!("item {id} cannot be edited"),
        ));
    }
    Ok(())
}

/// Capture times run backwards, so request order and capture order differ
fn capture_time(index: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() - Duration::minutes(index as i64)
}

// ============================================================================
// Other collaborators
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    saves: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait::async_trait]
impl IKeyValueStore for MemoryStore {
    async fn read_value(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn save_value(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

pub struct FakeQuota {
    pub usage: AtomicU64,
    pub limit: Option<u64>,
}

impl FakeQuota {
    pub fn unlimited() -> Arc<Self> {
        Arc::new(Self {
            usage: AtomicU64::new(0),
            limit: None,
        })
    }

    pub fn with_limit(usage: u64, limit: u64) -> Arc<Self> {
        Arc::new(Self {
            usage: AtomicU64::new(usage),
            limit: Some(limit),
        })
    }
}

#[async_trait::async_trait]
impl IQuotaService for FakeQuota {
    async fn force_refresh(&self) -> RemoteResult<()> {
        Ok(())
    }

    async fn get_quota(&self) -> RemoteResult<Quota> {
        Ok(Quota {
            limit: self.limit,
            usage: self.usage.load(Ordering::SeqCst),
        })
    }
}

// ============================================================================
// Builders
// ============================================================================

pub const STATE_KEY: &str = "upload_state";

/// Writes `count` files with distinct contents under `dir`
pub fn write_files(dir: &Path, prefix: &str, count: usize) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    (0..count)
        .map(|i| {
            let path = dir.join(format!("{prefix}{i:03}.jpg"));
            std::fs::write(&path, format!("{prefix}-{i}-{}", dir.display())).unwrap();
            path
        })
        .collect()
}

pub fn retry_policy(progress: Arc<ProgressCounter>) -> RetryPolicy {
    RetryPolicy::new(BackoffSettings::default(), progress, CancellationToken::new())
}

pub struct Harness {
    pub service: Arc<FakePhotosService>,
    pub backend: Arc<MemoryStore>,
    pub progress: Arc<ProgressCounter>,
    pub store: UploadStateStore,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_backend(FakePhotosService::new(), MemoryStore::new()).await
    }

    /// Harness over existing remote and persisted state, as after a restart
    pub async fn with_backend(service: Arc<FakePhotosService>, backend: Arc<MemoryStore>) -> Self {
        let store = UploadStateStore::load(backend.clone(), STATE_KEY)
            .await
            .unwrap();
        Self {
            service,
            backend,
            progress: Arc::new(ProgressCounter::new()),
            store,
        }
    }

    pub fn pipeline(&self, strategy: AddToAlbumStrategy) -> UploadPipeline {
        UploadPipeline::new(
            self.service.clone(),
            self.store.clone(),
            WorkerPool::new(4),
            retry_policy(self.progress.clone()),
            Arc::new(DriveSpaceGuard::disabled(FakeQuota::unlimited())),
            strategy,
            self.progress.clone(),
        )
    }

    pub fn uploader(&self, config: &Config, cancel: CancellationToken) -> Uploader {
        self.uploader_with_quota(config, FakeQuota::unlimited(), cancel)
    }

    pub fn uploader_with_quota(
        &self,
        config: &Config,
        quota: Arc<FakeQuota>,
        cancel: CancellationToken,
    ) -> Uploader {
        Uploader::new(
            self.service.clone(),
            quota,
            self.store.clone(),
            self.progress.clone(),
            config,
            cancel,
        )
    }
}

/// Directory whose album title is its path below `root`
pub fn directory(root: &Path, path: &Path, files: Vec<PathBuf>) -> AlbumDirectory {
    AlbumDirectory::new(root, path, files, " / ").unwrap()
}

pub fn album_of(service: &FakePhotosService, id: &AlbumId) -> RemoteAlbum {
    let library = service.library.lock().unwrap();
    let album = library
        .albums
        .iter()
        .find(|a| &a.album.id == id)
        .unwrap();
    RemoteAlbum {
        item_count: album.items.len() as u64,
        ..album.album.clone()
    }
}
