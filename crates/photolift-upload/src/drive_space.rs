//! Remote storage usage guard
//!
//! Uploads stop early when the account runs out of room. The guard checks the
//! quota before the first upload and again after every
//! `check_interval` bytes have been uploaded. Without a configured policy it
//! does nothing and never contacts the quota service.

use std::sync::Arc;

use photolift_core::config::DriveSpaceConfig;
use photolift_core::ports::{IQuotaService, Quota};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{Result, UploadError};

const MIB: u64 = 1024 * 1024;

/// Usage limit that stops the upload once crossed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveSpacePolicy {
    /// Keep at least this many bytes free
    MinFreeBytes(u64),
    /// Keep usage at or below this percentage of the limit
    MaxUsedPercent(u8),
}

impl DriveSpacePolicy {
    pub fn from_config(config: &DriveSpaceConfig) -> Option<Self> {
        match (config.min_free_mb, config.max_used_percent) {
            (Some(mb), _) => Some(DriveSpacePolicy::MinFreeBytes(mb * MIB)),
            (None, Some(percent)) => Some(DriveSpacePolicy::MaxUsedPercent(percent)),
            (None, None) => None,
        }
    }

    /// Describes the violation, if `quota` breaks the policy
    fn violation(&self, quota: &Quota) -> Option<String> {
        match *self {
            DriveSpacePolicy::MinFreeBytes(min) => {
                let free = quota.free()?;
                (free < min).then(|| format!("{free} bytes free, at least {min} required"))
            }
            DriveSpacePolicy::MaxUsedPercent(max) => {
                let used = quota.used_percent()?;
                (used > f64::from(max)).then(|| format!("{used:.1}% used, limit is {max}%"))
            }
        }
    }
}

#[derive(Debug, Default)]
struct GuardCounters {
    bytes_since_check: u64,
    checked_once: bool,
}

/// Periodic quota check around binary uploads
pub struct DriveSpaceGuard {
    quota: Arc<dyn IQuotaService>,
    policy: Option<DriveSpacePolicy>,
    check_interval_bytes: u64,
    counters: Mutex<GuardCounters>,
}

impl DriveSpaceGuard {
    pub fn new(
        quota: Arc<dyn IQuotaService>,
        policy: Option<DriveSpacePolicy>,
        check_interval_bytes: u64,
    ) -> Self {
        Self {
            quota,
            policy,
            check_interval_bytes: check_interval_bytes.max(1),
            counters: Mutex::new(GuardCounters::default()),
        }
    }

    pub fn from_config(quota: Arc<dyn IQuotaService>, config: &DriveSpaceConfig) -> Self {
        Self::new(
            quota,
            DriveSpacePolicy::from_config(config),
            config.check_interval_mb * MIB,
        )
    }

    /// Guard that never checks anything
    pub fn disabled(quota: Arc<dyn IQuotaService>) -> Self {
        Self::new(quota, None, 10 * MIB)
    }

    /// Checks the quota if no check has happened yet
    pub async fn before_upload(&self) -> Result<()> {
        let Some(policy) = self.policy else {
            return Ok(());
        };
        let mut counters = self.counters.lock().await;
        if !counters.checked_once {
            self.refresh(policy).await?;
            counters.checked_once = true;
            counters.bytes_since_check = 0;
        }
        Ok(())
    }

    /// Accounts for `bytes` just uploaded and checks the quota when the
    /// interval is reached
    pub async fn after_upload(&self, bytes: u64) -> Result<()> {
        let Some(policy) = self.policy else {
            return Ok(());
        };
        let mut counters = self.counters.lock().await;
        counters.bytes_since_check = counters.bytes_since_check.saturating_add(bytes);
        if counters.bytes_since_check >= self.check_interval_bytes {
            self.refresh(policy).await?;
            counters.checked_once = true;
            counters.bytes_since_check = 0;
        }
        Ok(())
    }

    async fn refresh(&self, policy: DriveSpacePolicy) -> Result<()> {
        self.quota
            .force_refresh()
            .await
            .map_err(UploadError::QuotaCheck)?;
        let quota = self
            .quota
            .get_quota()
            .await
            .map_err(UploadError::QuotaCheck)?;
        debug!(usage = quota.usage, limit = ?quota.limit, "Checked drive quota");

        if let Some(message) = policy.violation(&quota) {
            error!(?policy, usage = quota.usage, limit = ?quota.limit, "Drive space limit reached");
            return Err(UploadError::DriveSpace(message));
        }
        Ok(())
    }
}
