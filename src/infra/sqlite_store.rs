use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{PersistOutcome, StorePort};
use crate::common::error::{PipelineError, Result};
use crate::domain::{Record, UrlStatus};
use crate::pipeline::audit::AuditEntry;

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    CREATE TABLE IF NOT EXISTS repositories (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT UNIQUE NOT NULL,
        url             TEXT,
        url_valid       INTEGER NOT NULL DEFAULT 1,
        description     TEXT,
        language        TEXT,
        stars           INTEGER,
        forks           INTEGER,
        trending_metric REAL,
        scraped_at      TIMESTAMP,
        created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE TABLE IF NOT EXISTS quality_checks (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        check_type   TEXT NOT NULL,
        check_result TEXT,
        checked_at   TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// A repository row as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRepository {
    pub name: String,
    pub url: String,
    pub url_valid: bool,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: i64,
    pub forks: i64,
    pub trending_metric: f64,
    pub scraped_at: String,
    pub created_at: String,
}

/// SQLite-backed store. A connection is opened per call and closed when the
/// call returns, whatever the outcome.
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Write records and audit entries in one transaction.
    ///
    /// A `name` that already exists is left untouched and counted as skipped.
    pub fn persist_all(&self, records: &[Record], audit: &[AuditEntry]) -> Result<PersistOutcome> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let mut outcome = PersistOutcome::default();

        {
            let mut insert_repo = tx.prepare(
                "INSERT OR IGNORE INTO repositories
                 (name, url, url_valid, description, language, stars, forks, trending_metric, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for record in records {
                let changed = insert_repo.execute(params![
                    record.name,
                    record.url,
                    record.url_status == UrlStatus::Valid,
                    record.description,
                    record.language,
                    to_sql_count(record.stars),
                    to_sql_count(record.forks),
                    record.trending_metric,
                    record.scraped_at.to_rfc3339(),
                ])?;
                if changed == 0 {
                    warn!(name = %record.name, "Repository already stored; skipping insert");
                    outcome.skipped_duplicates += 1;
                } else {
                    outcome.inserted += 1;
                }
            }

            let mut insert_check = tx.prepare(
                "INSERT INTO quality_checks (check_type, check_result, checked_at) VALUES (?1, ?2, ?3)",
            )?;
            for entry in audit {
                insert_check.execute(params![
                    entry.check_type,
                    entry.check_result,
                    entry.checked_at.to_rfc3339(),
                ])?;
                outcome.audit_entries_written += 1;
            }
        }

        tx.commit()?;
        info!(
            inserted = outcome.inserted,
            skipped = outcome.skipped_duplicates,
            checks = outcome.audit_entries_written,
            db = %self.path.display(),
            "Persisted run"
        );
        Ok(outcome)
    }

    /// All stored repositories, most stars first
    pub fn load_repositories(&self) -> Result<Vec<StoredRepository>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT name, url, url_valid, description, language, stars, forks, trending_metric,
                    scraped_at, created_at
             FROM repositories ORDER BY stars DESC, name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredRepository {
                name: row.get(0)?,
                url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                url_valid: row.get(2)?,
                description: row.get(3)?,
                language: row.get(4)?,
                stars: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                forks: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                trending_metric: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
                scraped_at: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                created_at: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            })
        })?;
        let repos = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// The persisted audit trail in insertion order, optionally only the last `limit` entries
    pub fn load_quality_checks(&self, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        let conn = self.open()?;
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = conn.prepare(
            "SELECT check_type, check_result, checked_at FROM (
                 SELECT id, check_type, check_result, checked_at
                 FROM quality_checks ORDER BY id DESC LIMIT ?1
             ) ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (check_type, check_result, checked_at) = row?;
            entries.push(AuditEntry {
                check_type,
                check_result,
                checked_at: parse_timestamp(&checked_at)?,
            });
        }
        debug!(count = entries.len(), "Loaded quality checks");
        Ok(entries)
    }
}

#[async_trait]
impl StorePort for SqliteStore {
    #[instrument(skip(self, records, audit), fields(db = %self.path.display()))]
    async fn persist(&self, records: &[Record], audit: &[AuditEntry]) -> Result<PersistOutcome> {
        self.persist_all(records, audit)
    }
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// `checked_at` is written as RFC 3339; rows from the column default use SQLite's own format.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| PipelineError::Data(format!("unreadable timestamp {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(name: &str, stars: u64) -> Record {
        Record {
            name: name.to_string(),
            url: format!("https://github.com/{}", name),
            url_status: UrlStatus::Valid,
            description: String::new(),
            language: "Unknown".to_string(),
            stars,
            forks: 1,
            trending_metric: 2.0,
            scraped_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn entry(check_type: &str) -> AuditEntry {
        AuditEntry {
            check_type: check_type.to_string(),
            check_result: "PASS: ok".to_string(),
            checked_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap(),
        }
    }

    #[test]
    fn test_round_trip_and_conflict_skip() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("nested/trending.db"), Duration::from_secs(1));

        let first = store
            .persist_all(&[record("a/a", 5), record("b/b", 50)], &[entry("duplicates")])
            .unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped_duplicates, 0);
        assert_eq!(first.audit_entries_written, 1);

        let second = store
            .persist_all(&[record("a/a", 999), record("c/c", 1)], &[entry("url_validity")])
            .unwrap();
        assert_eq!(second.inserted, 1);
        assert_eq!(second.skipped_duplicates, 1);

        let repos = store.load_repositories().unwrap();
        assert_eq!(repos.len(), 3);
        assert_eq!(repos[0].name, "b/b");
        // the original row wins over the conflicting insert
        let a = repos.iter().find(|r| r.name == "a/a").unwrap();
        assert_eq!(a.stars, 5);
        assert!(!a.created_at.is_empty());

        let checks = store.load_quality_checks(None).unwrap();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].check_type, "duplicates");
        assert_eq!(checks[0].checked_at, entry("duplicates").checked_at);
        assert_eq!(store.load_quality_checks(Some(1)).unwrap()[0].check_type, "url_validity");
    }

    #[test]
    fn test_flagged_url_is_persisted_as_invalid() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("t.db"), Duration::from_secs(1));
        let mut bad = record("x/x", 1);
        bad.url = "not-a-url".to_string();
        bad.url_status = UrlStatus::Invalid;
        store.persist_all(&[bad], &[]).unwrap();

        let repos = store.load_repositories().unwrap();
        assert_eq!(repos[0].url, "not-a-url");
        assert!(!repos[0].url_valid);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-01-01T00:00:01+00:00").is_ok());
        assert!(parse_timestamp("2025-01-01 00:00:01").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
