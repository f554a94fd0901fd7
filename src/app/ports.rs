use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::common::error::Result;
use crate::domain::{RawRecord, Record};
use crate::pipeline::audit::AuditEntry;

/// Produces the raw records for one run.
#[async_trait]
pub trait SourcePort: Send + Sync {
    /// Human-readable origin, used in logs
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<RawRecord>>;
}

/// Durable persistence for cleaned records and the audit trail.
///
/// Implementations must write everything or nothing, and must treat a
/// repeated `name` as a skip rather than an error.
#[async_trait]
pub trait StorePort: Send + Sync {
    async fn persist(&self, records: &[Record], audit: &[AuditEntry]) -> Result<PersistOutcome>;
}

/// Renders a summary of the cleaned collection.
#[async_trait]
pub trait ReporterPort: Send + Sync {
    async fn report(&self, run_id: Uuid, records: &[Record]) -> Result<ReportOutcome>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOutcome {
    pub inserted: usize,
    /// Rows ignored by the unique constraint on `name`
    pub skipped_duplicates: usize,
    pub audit_entries_written: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub artifacts: Vec<PathBuf>,
}

// Source-side port for fetching the trending document
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}
