//! Remote failure classification and exponential backoff
//!
//! Every remote call made by the engine goes through [`RetryPolicy`]. A failed
//! call is classified by its status code:
//!
//! - **Retryable**: the call is repeated after an exponentially growing delay.
//!   Each [`BackoffClass`] keeps its own interval and elapsed-time budget.
//! - **User-correctable**: surfaced as [`UploadError::UserCorrectable`] so the
//!   caller can report it against the affected files and carry on.
//! - **Fatal**: surfaced as [`UploadError::Remote`].
//!
//! Backoff state lives in a [`BackoffState`] value owned by one logical
//! operation (a file upload, an album merge). A successful call resets every
//! class, so a later failure starts again from the initial interval.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use photolift_core::config::{BackoffConfig, RetryConfig};
use photolift_core::ports::{IProgressSink, RemoteError, RemoteResult, StatusCode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, UploadError};

// ============================================================================
// Operations and classification
// ============================================================================

/// Remote call being attempted, used for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    UploadBinary,
    CreateMediaItems,
    CreateAlbum,
    ListAlbums,
    ListAlbumItems,
    AddToAlbum,
    RemoveFromAlbum,
    QueryQuota,
}

impl RemoteOperation {
    /// Operations whose arguments come from user content (files, album edits)
    fn carries_user_input(self) -> bool {
        matches!(
            self,
            RemoteOperation::UploadBinary
                | RemoteOperation::CreateMediaItems
                | RemoteOperation::AddToAlbum
                | RemoteOperation::RemoveFromAlbum
        )
    }

    fn creates_content(self) -> bool {
        matches!(
            self,
            RemoteOperation::UploadBinary | RemoteOperation::CreateMediaItems
        )
    }
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteOperation::UploadBinary => "upload binary",
            RemoteOperation::CreateMediaItems => "create media items",
            RemoteOperation::CreateAlbum => "create album",
            RemoteOperation::ListAlbums => "list albums",
            RemoteOperation::ListAlbumItems => "list album items",
            RemoteOperation::AddToAlbum => "add to album",
            RemoteOperation::RemoveFromAlbum => "remove from album",
            RemoteOperation::QueryQuota => "query quota",
        };
        write!(f, "{}", s)
    }
}

/// Retryable failure class; each class backs off independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffClass {
    ResourceExhausted,
    Unavailable,
    DeadlineExceeded,
    Aborted,
    Internal,
}

impl fmt::Display for BackoffClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackoffClass::ResourceExhausted => "resource exhausted",
            BackoffClass::Unavailable => "unavailable",
            BackoffClass::DeadlineExceeded => "deadline exceeded",
            BackoffClass::Aborted => "aborted",
            BackoffClass::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// What to do about a failed remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Retryable(BackoffClass),
    UserCorrectable(String),
    Fatal,
}

/// Maps a remote failure to the action the engine takes
pub fn classify(operation: RemoteOperation, error: &RemoteError) -> Classification {
    match error.code {
        StatusCode::ResourceExhausted => Classification::Retryable(BackoffClass::ResourceExhausted),
        StatusCode::Unavailable => Classification::Retryable(BackoffClass::Unavailable),
        StatusCode::DeadlineExceeded => Classification::Retryable(BackoffClass::DeadlineExceeded),
        StatusCode::Aborted => Classification::Retryable(BackoffClass::Aborted),
        StatusCode::Internal => Classification::Retryable(BackoffClass::Internal),
        StatusCode::PermissionDenied | StatusCode::AlreadyExists => {
            Classification::UserCorrectable(error.to_string())
        }
        StatusCode::InvalidArgument if operation.carries_user_input() => {
            Classification::UserCorrectable(error.to_string())
        }
        StatusCode::FailedPrecondition if operation.creates_content() => {
            Classification::UserCorrectable(error.to_string())
        }
        _ => Classification::Fatal,
    }
}

/// Converts a failure that will not be retried into the engine's error type
pub fn into_upload_error(operation: RemoteOperation, error: RemoteError) -> UploadError {
    match classify(operation, &error) {
        Classification::UserCorrectable(message) => UploadError::UserCorrectable(message),
        _ => UploadError::Remote {
            operation,
            source: error,
        },
    }
}

// ============================================================================
// Backoff state
// ============================================================================

/// Backoff parameters for every class
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffSettings {
    pub resource_exhausted: BackoffConfig,
    pub transient: BackoffConfig,
}

impl BackoffSettings {
    fn for_class(&self, class: BackoffClass) -> &BackoffConfig {
        match class {
            BackoffClass::ResourceExhausted => &self.resource_exhausted,
            _ => &self.transient,
        }
    }
}

impl From<&RetryConfig> for BackoffSettings {
    fn from(config: &RetryConfig) -> Self {
        Self {
            resource_exhausted: config.resource_exhausted.clone(),
            transient: config.transient.clone(),
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[derive(Debug, Clone)]
struct ClassBackoff {
    next_interval: Duration,
    started: Instant,
}

/// Exponential backoff progress of one logical operation
#[derive(Debug, Clone)]
pub struct BackoffState {
    settings: BackoffSettings,
    classes: HashMap<BackoffClass, ClassBackoff>,
}

impl BackoffState {
    pub fn new(settings: BackoffSettings) -> Self {
        Self {
            settings,
            classes: HashMap::new(),
        }
    }

    /// Returns the delay before the next attempt, or `None` once the class
    /// has been retrying for longer than its elapsed ceiling
    pub fn next_delay(&mut self, class: BackoffClass) -> Option<Duration> {
        let config = self.settings.for_class(class);
        let now = Instant::now();
        let entry = self.classes.entry(class).or_insert_with(|| ClassBackoff {
            next_interval: config.initial_interval(),
            started: now,
        });

        if now.duration_since(entry.started) >= config.max_elapsed() {
            return None;
        }

        let delay = entry.next_interval;
        let max_interval = config.max_interval();
        // Overflowing or non-finite products saturate at the ceiling
        entry.next_interval =
            Duration::try_from_secs_f64(delay.as_secs_f64() * config.multiplier)
                .map_or(max_interval, |next| next.min(max_interval));
        Some(delay)
    }

    /// Time spent backing off for `class` so far
    pub fn elapsed(&self, class: BackoffClass) -> Duration {
        self.classes
            .get(&class)
            .map(|c| c.started.elapsed())
            .unwrap_or_default()
    }

    /// Forgets all backoff progress
    pub fn reset(&mut self) {
        self.classes.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Runs remote calls with classification and backoff
#[derive(Clone)]
pub struct RetryPolicy {
    settings: BackoffSettings,
    progress: Arc<dyn IProgressSink>,
    cancel: CancellationToken,
}

impl RetryPolicy {
    pub fn new(
        settings: BackoffSettings,
        progress: Arc<dyn IProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            progress,
            cancel,
        }
    }

    /// Fresh backoff state for a new logical operation
    pub fn new_state(&self) -> BackoffState {
        BackoffState::new(self.settings.clone())
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `action` with a backoff state of its own
    pub async fn with_retry<T, F, Fut>(
        &self,
        operation: RemoteOperation,
        name: &str,
        action: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut state = self.new_state();
        self.with_retry_state(&mut state, operation, name, action)
            .await
    }

    /// Runs `action` until it succeeds or fails for good, sharing `state`
    /// with the other calls of the same logical operation
    pub async fn with_retry_state<T, F, Fut>(
        &self,
        state: &mut BackoffState,
        operation: RemoteOperation,
        name: &str,
        mut action: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match action().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(%operation, item = name, attempt, "Operation succeeded after retry");
                    }
                    state.reset();
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = match classify(operation, &error) {
                Classification::Retryable(class) => class,
                Classification::UserCorrectable(message) => {
                    return Err(UploadError::UserCorrectable(message));
                }
                Classification::Fatal => {
                    return Err(UploadError::Remote {
                        operation,
                        source: error,
                    });
                }
            };

            let Some(delay) = state.next_delay(class) else {
                let elapsed = state.elapsed(class);
                warn!(%operation, item = name, %class, ?elapsed, error = %error, "Giving up after retries");
                return Err(UploadError::RetriesExhausted {
                    operation,
                    class,
                    elapsed,
                    source: error,
                });
            };

            debug!(
                %operation,
                item = name,
                %class,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable error, backing off"
            );
            self.progress.on_backoff_delay(delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
            }
        }
    }
}
