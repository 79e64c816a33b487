//! Core types and shared functionality for pmdex.
//!
//! This crate provides:
//! - The typed evidence model with coverage validation and deduplication
//! - The cache entry store with SQLite backend and conditional updates
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod evidence;

pub use cache::{CacheDb, CacheEntry, EntryStatus};
pub use error::Error;
pub use evidence::{EvidenceBlock, EvidenceSet};
