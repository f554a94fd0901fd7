use crate::app::ports::SourcePort;
use crate::common::error::{PipelineError, Result};
use crate::domain::RawRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use super::github_trending::parse_trending_html;

/// A trending page saved to disk, for offline runs.
pub struct HtmlFileSource {
    path: PathBuf,
}

impl HtmlFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourcePort for HtmlFileSource {
    fn describe(&self) -> String {
        format!("html file {}", self.path.display())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let html = read_source(&self.path)?;
        let records = parse_trending_html(&html, Utc::now())?;
        info!("Loaded {} records from saved page", records.len());
        Ok(records)
    }
}

/// A JSON array of raw field mappings, one object per repository.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourcePort for JsonFileSource {
    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let content = read_source(&self.path)?;
        let records: Vec<RawRecord> = serde_json::from_str(&content).map_err(|e| PipelineError::Fetch {
            message: format!("{} is not a valid record array: {}", self.path.display(), e),
        })?;
        info!("Loaded {} records from JSON", records.len());
        Ok(records)
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| PipelineError::Fetch {
        message: format!("cannot read {}: {}", path.display(), e),
    })
}
