//! SQLite-backed cache for per-key extraction entries.
//!
//! This module provides the persistent CacheEntry table with async access
//! via tokio-rusqlite. It supports:
//!
//! - One row per document key with an explicit lifecycle status
//! - Conditional (version-checked) updates for at-most-one-effective-extraction
//! - Content fingerprints (SHA-256) for skip-reprocessing decisions
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{CacheEntry, EntryStatus};
pub use hash::content_fingerprint;
