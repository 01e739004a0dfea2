//! Integration tests for album resolution and duplicate-album merging
//!
//! Verifies:
//! - Creating, reusing and ignoring read-only albums
//! - Merging duplicates into one primary album
//! - Sub-batch boundaries of album edits
//! - Per-item fallback when a sub-batch is rejected

use std::path::PathBuf;
use std::sync::Arc;

use photolift_core::domain::{AlbumDirectory, MediaId};
use photolift_core::ports::ProgressCounter;
use photolift_upload::album::AlbumReconciler;
use photolift_upload::worker_pool::WorkerPool;

use crate::common::{self, Call, FakePhotosService};

fn reconciler(service: &Arc<FakePhotosService>) -> (AlbumReconciler, Arc<ProgressCounter>) {
    let progress = Arc::new(ProgressCounter::new());
    let reconciler = AlbumReconciler::new(
        service.clone(),
        common::retry_policy(progress.clone()),
        WorkerPool::new(4),
        progress.clone(),
    );
    (reconciler, progress)
}

fn titled(title: &str) -> AlbumDirectory {
    AlbumDirectory::with_title(PathBuf::from("/photos").join(title), Some(title.to_string()), Vec::new())
}

fn seed_items(service: &FakePhotosService, count: usize) -> Vec<MediaId> {
    (0..count).map(|_| service.seed_item()).collect()
}

#[tokio::test]
async fn test_missing_album_is_created() {
    let service = FakePhotosService::new();
    let (reconciler, _) = reconciler(&service);

    let by_title = reconciler.list_remote_albums().await.unwrap();
    let resolution = reconciler
        .reconcile(&[titled("New")], &by_title)
        .await
        .unwrap();

    assert_eq!(service.calls(Call::CreateAlbum), 1);
    let created = &resolution.albums["New"];
    assert_eq!(created.title, "New");
    assert!(created.writable);
    assert!(resolution.manual_deletions.is_empty());
}

#[tokio::test]
async fn test_read_only_album_is_not_used() {
    let service = FakePhotosService::new();
    let shared = service.seed_album("Shared", false, seed_items(&service, 2));
    let (reconciler, _) = reconciler(&service);

    let by_title = reconciler.list_remote_albums().await.unwrap();
    let resolution = reconciler
        .reconcile(&[titled("Shared")], &by_title)
        .await
        .unwrap();

    assert_eq!(service.calls(Call::CreateAlbum), 1);
    assert_ne!(resolution.albums["Shared"].id, shared);
}

#[tokio::test]
async fn test_single_writable_album_is_reused() {
    let service = FakePhotosService::new();
    let existing = service.seed_album("Trip", true, Vec::new());
    let (reconciler, _) = reconciler(&service);

    let by_title = reconciler.list_remote_albums().await.unwrap();
    let resolution = reconciler
        .reconcile(&[titled("Trip"), titled("Trip")], &by_title)
        .await
        .unwrap();

    assert_eq!(resolution.albums["Trip"].id, existing);
    assert_eq!(service.calls(Call::CreateAlbum), 0);
    assert_eq!(service.calls(Call::ListAlbumItems), 0);
}

#[tokio::test]
async fn test_empty_duplicates_pick_first_without_merging() {
    let service = FakePhotosService::new();
    let first = service.seed_album("X", true, Vec::new());
    let second = service.seed_album("X", true, Vec::new());
    let (reconciler, progress) = reconciler(&service);

    let by_title = reconciler.list_remote_albums().await.unwrap();
    let resolution = reconciler.reconcile(&[titled("X")], &by_title).await.unwrap();

    assert_eq!(resolution.albums["X"].id, first);
    assert_eq!(service.calls(Call::AddToAlbum), 0);
    assert_eq!(resolution.manual_deletions.len(), 1);
    assert_eq!(
        resolution.manual_deletions[0].key,
        format!("https://photos.example/{second}")
    );
    assert_eq!(progress.failures(), resolution.manual_deletions);
}

#[tokio::test]
async fn test_single_non_empty_duplicate_becomes_primary() {
    let service = FakePhotosService::new();
    let empty_a = service.seed_album("X", true, Vec::new());
    let full = service.seed_album("X", true, seed_items(&service, 2));
    let empty_b = service.seed_album("X", true, Vec::new());
    let (reconciler, _) = reconciler(&service);

    let by_title = reconciler.list_remote_albums().await.unwrap();
    let resolution = reconciler.reconcile(&[titled("X")], &by_title).await.unwrap();

    assert_eq!(resolution.albums["X"].id, full);
    assert_eq!(service.calls(Call::AddToAlbum), 0);
    let mut reported: Vec<String> = resolution
        .manual_deletions
        .iter()
        .map(|e| e.key.clone())
        .collect();
    reported.sort();
    let mut expected = vec![
        format!("https://photos.example/{empty_a}"),
        format!("https://photos.example/{empty_b}"),
    ];
    expected.sort();
    assert_eq!(reported, expected);
}

#[tokio::test]
async fn test_non_empty_duplicates_are_merged_into_primary() {
    let service = FakePhotosService::new();
    let shared = service.seed_item();
    let mut primary_items = seed_items(&service, 2);
    primary_items.push(shared.clone());
    let only_in_source = service.seed_item();
    let primary = service.seed_album("X", true, primary_items.clone());
    let source = service.seed_album("X", true, vec![shared, only_in_source.clone()]);
    let (reconciler, _) = reconciler(&service);

    let by_title = reconciler.list_remote_albums().await.unwrap();
    let resolution = reconciler.reconcile(&[titled("X")], &by_title).await.unwrap();

    let resolved = &resolution.albums["X"];
    assert_eq!(resolved.id, primary);
    assert_eq!(resolved.item_count, 4);

    let mut expected = primary_items;
    expected.push(only_in_source);
    assert_eq!(service.album_items(&primary), expected);
    assert!(service.album_items(&source).is_empty());

    // Only the item missing from the primary is added
    assert_eq!(service.batch_sizes(Call::AddToAlbum), vec![1]);
    assert_eq!(service.batch_sizes(Call::RemoveFromAlbum), vec![2]);
    assert_eq!(resolution.manual_deletions.len(), 1);
    assert!(resolution.manual_deletions[0].key.ends_with(source.as_str()));
}

#[tokio::test]
async fn test_forty_nine_items_merge_in_one_sub_batch() {
    let service = FakePhotosService::new();
    let primary = service.seed_album("X", true, seed_items(&service, 1));
    let source = service.seed_album("X", true, seed_items(&service, 49));
    let (reconciler, _) = reconciler(&service);

    let added = reconciler
        .merge(
            &common::album_of(&service, &primary),
            &[&common::album_of(&service, &source)],
        )
        .await
        .unwrap();

    assert_eq!(added, 49);
    assert_eq!(service.batch_sizes(Call::AddToAlbum), vec![49]);
    assert_eq!(service.batch_sizes(Call::RemoveFromAlbum), vec![49]);
}

#[tokio::test]
async fn test_fifty_items_merge_in_two_sub_batches() {
    let service = FakePhotosService::new();
    let primary = service.seed_album("X", true, seed_items(&service, 1));
    let source = service.seed_album("X", true, seed_items(&service, 50));
    let (reconciler, _) = reconciler(&service);

    let added = reconciler
        .merge(
            &common::album_of(&service, &primary),
            &[&common::album_of(&service, &source)],
        )
        .await
        .unwrap();

    assert_eq!(added, 50);
    assert_eq!(service.batch_sizes(Call::AddToAlbum), vec![49, 1]);
    assert_eq!(service.batch_sizes(Call::RemoveFromAlbum), vec![49, 1]);
    assert_eq!(service.album_items(&primary).len(), 51);
    assert!(service.album_items(&source).is_empty());
}

#[tokio::test]
async fn test_rejected_sub_batch_falls_back_to_single_items() {
    let service = FakePhotosService::new();
    let primary = service.seed_album("X", true, seed_items(&service, 1));
    let source_items = seed_items(&service, 3);
    let source = service.seed_album("X", true, source_items.clone());
    service.reject_item(&source_items[1]);
    let (reconciler, _) = reconciler(&service);

    reconciler
        .merge(
            &common::album_of(&service, &primary),
            &[&common::album_of(&service, &source)],
        )
        .await
        .expect("rejected items must not abort the merge");

    assert_eq!(service.batch_sizes(Call::AddToAlbum), vec![3, 1, 1, 1]);
    assert_eq!(service.batch_sizes(Call::RemoveFromAlbum), vec![3, 1, 1, 1]);

    let merged = service.album_items(&primary);
    assert!(merged.contains(&source_items[0]));
    assert!(!merged.contains(&source_items[1]));
    assert!(merged.contains(&source_items[2]));
    assert_eq!(service.album_items(&source), vec![source_items[1].clone()]);
}
