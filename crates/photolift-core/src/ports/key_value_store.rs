//! Key-value persistence port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, files, memory) and are never retried by the engine.
//! - Values are JSON documents; callers own their schema.
//! - A single `save_value` must be atomic: readers see either the previous
//!   or the new document, never a mix.

use serde_json::Value;

/// Durable storage for JSON documents keyed by string
#[async_trait::async_trait]
pub trait IKeyValueStore: Send + Sync {
    /// Reads the document stored under `key`, if any
    async fn read_value(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous document
    async fn save_value(&self, key: &str, value: &Value) -> anyhow::Result<()>;
}
