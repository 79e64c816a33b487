//! Cache entry rows and conditional updates.
//!
//! One row per document key. The `version` column carries the optimistic
//! concurrency discipline: every write is conditioned on the version the
//! entry was read at, so two concurrent processors for the same key cannot
//! both commit a full extraction. The loser observes a failed conditional
//! update, re-reads, and adopts the winner's state.

use super::connection::CacheDb;
use crate::Error;
use crate::evidence::EvidenceSet;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Lifecycle states of a cache entry.
///
/// NEW/FETCHING/PARSING are in-flight; the rest are terminal until the next
/// request. FETCH_FAIL and PARSE_FAIL re-enter the pipeline from FETCHING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    New,
    Fetching,
    Parsing,
    Ok,
    NoPdf,
    FetchFail,
    ParseFail,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::New => "NEW",
            EntryStatus::Fetching => "FETCHING",
            EntryStatus::Parsing => "PARSING",
            EntryStatus::Ok => "OK",
            EntryStatus::NoPdf => "NO_PDF",
            EntryStatus::FetchFail => "FETCH_FAIL",
            EntryStatus::ParseFail => "PARSE_FAIL",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "NEW" => Ok(EntryStatus::New),
            "FETCHING" => Ok(EntryStatus::Fetching),
            "PARSING" => Ok(EntryStatus::Parsing),
            "OK" => Ok(EntryStatus::Ok),
            "NO_PDF" => Ok(EntryStatus::NoPdf),
            "FETCH_FAIL" => Ok(EntryStatus::FetchFail),
            "PARSE_FAIL" => Ok(EntryStatus::ParseFail),
            other => Err(Error::InvalidInput(format!("unknown entry status: {other}"))),
        }
    }

    /// Terminal states a concurrent loser can return as-is.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Ok | EntryStatus::NoPdf | EntryStatus::FetchFail | EntryStatus::ParseFail
        )
    }
}

/// One cached extraction per document key.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub key: String,
    pub status: EntryStatus,
    pub source_uri: Option<String>,
    /// Sha256 hex of the last successfully fetched document bytes.
    pub content_fingerprint: Option<String>,
    pub extraction: Option<EvidenceSet>,
    /// Last failure description; cleared on any successful transition.
    pub error: Option<String>,
    pub fetched_at: Option<String>,
    pub parsed_at: Option<String>,
    pub updated_at: String,
    /// Optimistic concurrency token; bumped on every committed write.
    pub version: i64,
}

impl CacheEntry {
    fn new(key: String, source_uri: Option<String>) -> Self {
        Self {
            key,
            status: EntryStatus::New,
            source_uri,
            content_fingerprint: None,
            extraction: None,
            error: None,
            fetched_at: None,
            parsed_at: None,
            updated_at: chrono::Utc::now().to_rfc3339(),
            version: 0,
        }
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<(CacheEntry, Option<String>), rusqlite::Error> {
    let status_raw: String = row.get(1)?;
    let extraction_raw: Option<String> = row.get(4)?;
    let entry = CacheEntry {
        key: row.get(0)?,
        status: EntryStatus::parse(&status_raw)
            .map_err(|_| rusqlite::Error::InvalidColumnType(1, "status".into(), rusqlite::types::Type::Text))?,
        source_uri: row.get(2)?,
        content_fingerprint: row.get(3)?,
        extraction: None,
        error: row.get(5)?,
        fetched_at: row.get(6)?,
        parsed_at: row.get(7)?,
        updated_at: row.get(8)?,
        version: row.get(9)?,
    };
    Ok((entry, extraction_raw))
}

const ENTRY_COLUMNS: &str = "key, status, source_uri, content_fingerprint, extraction,
                error, fetched_at, parsed_at, updated_at, version";

impl CacheDb {
    /// Get an entry by key. Returns None if the key has never been seen.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<(CacheEntry, Option<String>)>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE key = ?1"))?;
                match stmt.query_row(params![key], row_to_entry) {
                    Ok(pair) => Ok(Some(pair)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        match raw {
            None => Ok(None),
            Some((mut entry, extraction_raw)) => {
                if let Some(json) = extraction_raw {
                    let set: EvidenceSet = serde_json::from_str(&json)
                        .map_err(|_| Error::CorruptExtraction(entry.key.clone()))?;
                    entry.extraction = Some(set);
                }
                Ok(Some(entry))
            }
        }
    }

    /// Get the entry for a key, creating a NEW one on first reference.
    ///
    /// A supplied `source_uri` is recorded only at creation; an existing
    /// entry keeps its stored URI.
    pub async fn get_or_create_entry(&self, key: &str, source_uri: Option<&str>) -> Result<CacheEntry, Error> {
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("key cannot be empty".into()));
        }

        if let Some(entry) = self.get_entry(key).await? {
            return Ok(entry);
        }

        let entry = CacheEntry::new(key.to_string(), source_uri.map(|s| s.to_string()));
        let insert = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO entries (key, status, source_uri, updated_at, version)
                     VALUES (?1, ?2, ?3, ?4, 0)",
                    params![insert.key, insert.status.as_str(), insert.source_uri, insert.updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        // Re-read in case a concurrent creator won the INSERT.
        self.get_entry(key)
            .await?
            .ok_or_else(|| Error::CacheMiss(key.to_string()))
    }

    /// Conditionally commit an entry read at `entry.version`.
    ///
    /// Returns the committed entry (version bumped) on success, or None when
    /// another worker already advanced the row. The caller re-reads on None;
    /// it never overwrites blindly.
    pub async fn commit_entry(&self, entry: &CacheEntry) -> Result<Option<CacheEntry>, Error> {
        let mut committed = entry.clone();
        committed.updated_at = chrono::Utc::now().to_rfc3339();
        committed.version = entry.version + 1;

        let write = committed.clone();
        let extraction_json = match &write.extraction {
            Some(set) => Some(
                serde_json::to_string(set).map_err(|e| Error::InvalidInput(format!("unserializable extraction: {e}")))?,
            ),
            None => None,
        };

        let updated = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let n = conn.execute(
                    "UPDATE entries SET
                        status = ?1,
                        source_uri = ?2,
                        content_fingerprint = ?3,
                        extraction = ?4,
                        error = ?5,
                        fetched_at = ?6,
                        parsed_at = ?7,
                        updated_at = ?8,
                        version = ?9
                     WHERE key = ?10 AND version = ?11",
                    params![
                        write.status.as_str(),
                        write.source_uri,
                        write.content_fingerprint,
                        extraction_json,
                        write.error,
                        write.fetched_at,
                        write.parsed_at,
                        write.updated_at,
                        write.version,
                        write.key,
                        write.version - 1,
                    ],
                )?;
                Ok(n)
            })
            .await
            .map_err(Error::from)?;

        if updated == 1 { Ok(Some(committed)) } else { Ok(None) }
    }

    /// Delete an entry; used by maintenance tooling and tests.
    pub async fn delete_entry(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        let n = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?)
            })
            .await
            .map_err(Error::from)?;
        Ok(n == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EVIDENCE_SCHEMA_VERSION, EvidenceBlock};

    fn sample_set() -> EvidenceSet {
        EvidenceSet {
            meta: serde_json::json!({"brand_name": "Sampletol"}),
            blocks: vec![EvidenceBlock {
                heading: "DOSAGE AND ADMINISTRATION".into(),
                page: Some(12),
                category: "dosage".into(),
                text: "Adults: 500 mg every 6 hours.".into(),
                structured: None,
            }],
            schema_version: EVIDENCE_SCHEMA_VERSION,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_then_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = db.get_or_create_entry("02247521", Some("https://example.org/pm/1.PDF")).await.unwrap();

        assert_eq!(entry.status, EntryStatus::New);
        assert_eq!(entry.version, 0);
        assert_eq!(entry.source_uri.as_deref(), Some("https://example.org/pm/1.PDF"));

        let again = db.get_or_create_entry("02247521", None).await.unwrap();
        assert_eq!(again.source_uri.as_deref(), Some("https://example.org/pm/1.PDF"));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_or_create_entry("  ", None).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_round_trips_extraction() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut entry = db.get_or_create_entry("k1", None).await.unwrap();

        entry.status = EntryStatus::Ok;
        entry.content_fingerprint = Some("ab".repeat(32));
        entry.extraction = Some(sample_set());
        entry.parsed_at = Some(chrono::Utc::now().to_rfc3339());

        let committed = db.commit_entry(&entry).await.unwrap().unwrap();
        assert_eq!(committed.version, 1);

        let read = db.get_entry("k1").await.unwrap().unwrap();
        assert_eq!(read.status, EntryStatus::Ok);
        assert_eq!(read.extraction.unwrap().blocks.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_commit_loses() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = db.get_or_create_entry("k2", None).await.unwrap();

        // Two workers read version 0; only one commit lands.
        let mut first = entry.clone();
        first.status = EntryStatus::Fetching;
        let mut second = entry.clone();
        second.status = EntryStatus::Fetching;

        assert!(db.commit_entry(&first).await.unwrap().is_some());
        assert!(db.commit_entry(&second).await.unwrap().is_none());

        let read = db.get_entry("k2").await.unwrap().unwrap();
        assert_eq!(read.version, 1);
    }

    #[tokio::test]
    async fn test_error_cleared_by_successful_commit() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut entry = db.get_or_create_entry("k3", None).await.unwrap();

        entry.status = EntryStatus::FetchFail;
        entry.error = Some("fetch failed after 4 attempts".into());
        let entry = db.commit_entry(&entry).await.unwrap().unwrap();

        let mut retry = entry.clone();
        retry.status = EntryStatus::Ok;
        retry.error = None;
        retry.extraction = Some(sample_set());
        db.commit_entry(&retry).await.unwrap().unwrap();

        let read = db.get_entry("k3").await.unwrap().unwrap();
        assert!(read.error.is_none());
    }
}
