//! Storage quota port (driven/secondary port)

use serde::{Deserialize, Serialize};

use super::photos_service::RemoteResult;

/// Storage quota of the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Total capacity in bytes; `None` for unlimited accounts
    pub limit: Option<u64>,
    /// Bytes currently used
    pub usage: u64,
}

impl Quota {
    /// Free bytes, `None` when unlimited
    pub fn free(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.usage))
    }

    /// Used fraction as a percentage, `None` when unlimited
    pub fn used_percent(&self) -> Option<f64> {
        match self.limit {
            Some(0) => Some(100.0),
            Some(limit) => Some(self.usage as f64 * 100.0 / limit as f64),
            None => None,
        }
    }
}

/// Storage quota queries
#[async_trait::async_trait]
pub trait IQuotaService: Send + Sync {
    /// Forces the service to recompute usage
    ///
    /// Usage figures are cached remotely; implementations typically perform
    /// a harmless write so that the next [`get_quota`](Self::get_quota)
    /// reflects recent uploads.
    async fn force_refresh(&self) -> RemoteResult<()>;

    async fn get_quota(&self) -> RemoteResult<Quota>;
}
