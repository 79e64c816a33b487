//! The per-key cache state machine.
//!
//! Owns the NEW → FETCHING → PARSING → OK / NO_PDF / FETCH_FAIL / PARSE_FAIL
//! lifecycle. Each transition is committed with a version-conditioned update;
//! a worker that loses a commit re-reads and waits for the winner's terminal
//! state rather than redoing the extraction, and a request that finds an
//! entry already in flight does the same. Transitions never hold a lock
//! across an oracle call.

pub mod repair;

use async_trait::async_trait;
use pmdex_core::evidence::coverage::{CoverageRequirement, default_requirements};
use pmdex_core::{CacheDb, CacheEntry, EntryStatus, Error};
use std::time::Duration;

use crate::fetch::{DocumentFetcher, PdfDocument};
use crate::oracle::ExtractionOracle;
use repair::RepairLoop;

/// Seam over the document fetcher so the state machine is testable
/// without a network.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<PdfDocument, Error>;

    /// Cheap check that a URI serves the expected document type. `Ok(false)`
    /// is a definitive miss; an error is inconclusive and the caller may
    /// still attempt a full fetch.
    async fn probe(&self, _uri: &str) -> Result<bool, Error> {
        Ok(true)
    }
}

#[async_trait]
impl DocumentSource for DocumentFetcher {
    async fn fetch(&self, uri: &str) -> Result<PdfDocument, Error> {
        DocumentFetcher::fetch(self, uri).await
    }

    async fn probe(&self, uri: &str) -> Result<bool, Error> {
        DocumentFetcher::probe(self, uri).await
    }
}

/// Outcome of one conditional commit attempt.
enum Commit {
    /// Our write landed; continue with the bumped entry.
    Applied(CacheEntry),
    /// Another worker advanced the row; this is what it holds now.
    Lost(CacheEntry),
}

/// How often a waiting request re-reads an entry another worker holds.
const IN_FLIGHT_POLL_INTERVAL: Duration = Duration::from_millis(150);
/// Re-reads before a held entry is reported as a conflict.
const IN_FLIGHT_POLL_ATTEMPTS: u32 = 200;

/// End-to-end extraction pipeline for one cache key.
pub struct Pipeline<O: ExtractionOracle, S: DocumentSource> {
    db: CacheDb,
    oracle: O,
    source: S,
    /// URI template with `{key}` placeholder; None means entries must carry
    /// their own source URI or resolve to NO_PDF.
    source_uri_template: Option<String>,
    requirements: &'static [CoverageRequirement],
    poll_interval: Duration,
    poll_attempts: u32,
}

impl<O: ExtractionOracle, S: DocumentSource> Pipeline<O, S> {
    pub fn new(db: CacheDb, oracle: O, source: S, source_uri_template: Option<String>) -> Self {
        Self {
            db,
            oracle,
            source,
            source_uri_template,
            requirements: default_requirements(),
            poll_interval: IN_FLIGHT_POLL_INTERVAL,
            poll_attempts: IN_FLIGHT_POLL_ATTEMPTS,
        }
    }

    /// Resolve the cache entry for a key, processing it when needed.
    ///
    /// An OK entry is returned as-is unless `refresh` is set; NO_PDF is
    /// terminal and not retried automatically. FETCH_FAIL and PARSE_FAIL
    /// re-enter the pipeline from FETCHING on every call. An entry another
    /// worker holds in FETCHING or PARSING is waited on, never reprocessed.
    pub async fn resolve(&self, key: &str, source_uri: Option<&str>, refresh: bool) -> Result<CacheEntry, Error> {
        let entry = self.db.get_or_create_entry(key, source_uri).await?;

        match entry.status {
            EntryStatus::Ok | EntryStatus::NoPdf if !refresh => Ok(entry),
            EntryStatus::Fetching | EntryStatus::Parsing => {
                tracing::debug!("entry {} is in flight elsewhere, waiting for a terminal state", key);
                self.await_terminal(entry).await
            }
            _ => self.run(entry).await,
        }
    }

    /// Poll an in-flight entry until its owner commits a terminal state.
    async fn await_terminal(&self, mut entry: CacheEntry) -> Result<CacheEntry, Error> {
        for _ in 0..self.poll_attempts {
            if entry.status.is_terminal() {
                return Ok(entry);
            }
            tokio::time::sleep(self.poll_interval).await;
            entry = self
                .db
                .get_entry(&entry.key)
                .await?
                .ok_or_else(|| Error::CacheMiss(entry.key.clone()))?;
        }
        Err(Error::Conflict(entry.key))
    }

    /// Drive one entry through the full state machine.
    async fn run(&self, mut entry: CacheEntry) -> Result<CacheEntry, Error> {
        let prior_ok = entry.status == EntryStatus::Ok;
        let prior_fingerprint = entry.content_fingerprint.clone();

        // Resolve a source URI or park the entry as NO_PDF.
        let uri = match entry
            .source_uri
            .clone()
            .or_else(|| self.source_uri_template.as_ref().map(|t| t.replace("{key}", &entry.key)))
        {
            Some(uri) => uri,
            None => {
                entry.status = EntryStatus::NoPdf;
                entry.error =
                    Some(Error::NoDocument(format!("no source document URI resolves for key {}", entry.key)).to_string());
                return self.finish(entry).await;
            }
        };

        // A URI is only a guess until a fetch has succeeded; confirm it
        // serves a PDF before committing to a full download. A probe error
        // is inconclusive and falls through to the retrying fetch.
        if entry.content_fingerprint.is_none() && matches!(self.source.probe(&uri).await, Ok(false)) {
            entry.source_uri = Some(uri);
            entry.status = EntryStatus::NoPdf;
            entry.error =
                Some(Error::NoDocument(format!("source URI for {} does not serve a PDF", entry.key)).to_string());
            return self.finish(entry).await;
        }
        entry.source_uri = Some(uri.clone());

        entry.status = EntryStatus::Fetching;
        entry.fetched_at = Some(chrono::Utc::now().to_rfc3339());
        entry.error = None;
        entry = match self.try_commit(entry).await? {
            Commit::Applied(e) => e,
            Commit::Lost(e) => return Ok(e),
        };

        let document = match self.source.fetch(&uri).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("fetch failed for {}: {}", entry.key, e);
                entry.status = EntryStatus::FetchFail;
                entry.error = Some(e.to_string());
                return self.finish(entry).await;
            }
        };

        entry.status = EntryStatus::Parsing;
        entry = match self.try_commit(entry).await? {
            Commit::Applied(e) => e,
            Commit::Lost(e) => return Ok(e),
        };

        // Idempotence under unchanged source: same fingerprint as the last
        // successful run means the persisted extraction is still valid and
        // the oracle is not invoked.
        if prior_ok
            && prior_fingerprint.as_deref() == Some(document.fingerprint.as_str())
            && entry.extraction.is_some()
        {
            tracing::debug!("fingerprint unchanged for {}, skipping extraction", entry.key);
            entry.status = EntryStatus::Ok;
            entry.error = None;
            return self.finish(entry).await;
        }

        let looper = RepairLoop::new(&self.oracle, self.requirements);
        let set = match looper.run(&uri).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!("extraction failed for {}: {}", entry.key, e);
                entry.status = EntryStatus::ParseFail;
                entry.error = Some(e.to_string());
                return self.finish(entry).await;
            }
        };

        if set.is_empty() {
            entry.status = EntryStatus::ParseFail;
            entry.error = Some(Error::ParseFailed("extraction produced no evidence blocks".into()).to_string());
            return self.finish(entry).await;
        }

        entry.status = EntryStatus::Ok;
        entry.extraction = Some(set);
        entry.content_fingerprint = Some(document.fingerprint);
        entry.parsed_at = Some(chrono::Utc::now().to_rfc3339());
        entry.error = None;
        self.finish(entry).await
    }

    /// Commit a terminal transition; a lost write yields the winner's entry.
    async fn finish(&self, entry: CacheEntry) -> Result<CacheEntry, Error> {
        match self.try_commit(entry).await? {
            Commit::Applied(e) | Commit::Lost(e) => Ok(e),
        }
    }

    /// Attempt a version-conditioned commit. A lost write means another
    /// worker owns the row; wait for its terminal state so the loser never
    /// observes an in-flight entry.
    async fn try_commit(&self, entry: CacheEntry) -> Result<Commit, Error> {
        match self.db.commit_entry(&entry).await? {
            Some(committed) => Ok(Commit::Applied(committed)),
            None => {
                tracing::debug!("lost conditional update for {}, adopting the winner's state", entry.key);
                let current = self
                    .db
                    .get_entry(&entry.key)
                    .await?
                    .ok_or_else(|| Error::CacheMiss(entry.key.clone()))?;
                let settled = self.await_terminal(current).await?;
                Ok(Commit::Lost(settled))
            }
        }
    }
}
