//! Integration tests for photolift-upload
//!
//! Runs the engine against an in-memory photo library and key-value store,
//! with real files on disk, and verifies resumability, batching, album
//! reconciliation and retry behavior end to end.

mod common;

mod test_albums;
mod test_retry;
