//! Integration tests for retry and backoff against the fake library
//!
//! Runs on tokio's paused clock, so backoff sleeps complete instantly while
//! their lengths are still observable through the progress sink.

use std::sync::Arc;
use std::time::Duration;

use photolift_core::ports::{ProgressCounter, StatusCode};
use photolift_upload::album::AlbumReconciler;
use photolift_upload::retry::{BackoffClass, BackoffSettings, RetryPolicy};
use photolift_upload::worker_pool::WorkerPool;
use photolift_upload::UploadError;
use tokio_util::sync::CancellationToken;

use crate::common::{self, Call, FakePhotosService};

fn reconciler_with(
    service: &Arc<FakePhotosService>,
    cancel: CancellationToken,
) -> (AlbumReconciler, Arc<ProgressCounter>) {
    let progress = Arc::new(ProgressCounter::new());
    let retry = RetryPolicy::new(BackoffSettings::default(), progress.clone(), cancel);
    let reconciler =
        AlbumReconciler::new(service.clone(), retry, WorkerPool::new(2), progress.clone());
    (reconciler, progress)
}

#[tokio::test(start_paused = true)]
async fn test_backoff_restarts_after_success_within_merge() {
    let service = FakePhotosService::new();
    let primary = service.seed_album("X", true, vec![service.seed_item()]);
    let source = service.seed_album("X", true, vec![service.seed_item()]);
    let (reconciler, progress) = reconciler_with(&service, CancellationToken::new());

    // Primary listing fails once, succeeds, then the source listing fails once
    service.fail_next(Call::ListAlbumItems, &[StatusCode::ResourceExhausted]);
    service.pass_next(Call::ListAlbumItems, 1);
    service.fail_next(Call::ListAlbumItems, &[StatusCode::ResourceExhausted]);

    reconciler
        .merge(
            &common::album_of(&service, &primary),
            &[&common::album_of(&service, &source)],
        )
        .await
        .unwrap();

    let initial = Duration::from_millis(5_000);
    assert_eq!(progress.backoff_delays(), vec![initial, initial]);
    assert_eq!(service.calls(Call::ListAlbumItems), 4);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_grow_the_delay() {
    let service = FakePhotosService::new();
    let (reconciler, progress) = reconciler_with(&service, CancellationToken::new());
    service.fail_next(
        Call::ListAlbums,
        &[
            StatusCode::Unavailable,
            StatusCode::Unavailable,
            StatusCode::Unavailable,
        ],
    );

    reconciler.list_remote_albums().await.unwrap();

    assert_eq!(
        progress.backoff_delays(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failure_exhausts_retries() {
    let service = FakePhotosService::new();
    let (reconciler, progress) = reconciler_with(&service, CancellationToken::new());
    service.fail_next(Call::ListAlbums, &[StatusCode::Internal; 100]);

    let result = reconciler.list_remote_albums().await;

    match result {
        Err(UploadError::RetriesExhausted { class, .. }) => {
            assert_eq!(class, BackoffClass::Internal)
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    let total: Duration = progress.backoff_delays().iter().sum();
    assert!(total >= Duration::from_secs(900));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff_sleep() {
    let service = FakePhotosService::new();
    let cancel = CancellationToken::new();
    let (reconciler, _) = reconciler_with(&service, cancel.clone());
    service.fail_next(Call::ListAlbums, &[StatusCode::ResourceExhausted; 10]);

    let (result, _) = tokio::join!(reconciler.list_remote_albums(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    assert!(matches!(result, Err(UploadError::Cancelled)));
    assert_eq!(service.calls(Call::ListAlbums), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_is_not_retried() {
    let service = FakePhotosService::new();
    let (reconciler, progress) = reconciler_with(&service, CancellationToken::new());
    service.fail_next(Call::ListAlbums, &[StatusCode::Unauthenticated]);

    let result = reconciler.list_remote_albums().await;

    assert!(matches!(result, Err(UploadError::Remote { .. })));
    assert!(progress.backoff_delays().is_empty());
    assert_eq!(service.calls(Call::ListAlbums), 1);
}
