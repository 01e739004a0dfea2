//! Photolift Core - Domain types, ports and configuration
//!
//! This crate contains the pieces shared by every Photolift adapter:
//! - **Domain types** - `AlbumDirectory`, `ItemState`, `UploadState`, `KeyedError`
//! - **Port definitions** - Traits for collaborators: `IPhotosService`, `IQuotaService`,
//!   `IKeyValueStore`, `IProgressSink`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//! - **Logging** - `tracing-subscriber` initialisation
//!
//! # Architecture
//!
//! The domain module holds pure data and state-transition rules. Ports define
//! the trait interfaces that the upload engine depends on and that adapter
//! crates (or tests) implement.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
