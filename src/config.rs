use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::constants::{
    DEFAULT_DB_PATH, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_OUTPUT_DIR, DEFAULT_REPORT_TOP_N,
    DEFAULT_SOURCE_URL, DEFAULT_STORE_BUSY_TIMEOUT_MS,
};
use crate::common::error::{PipelineError, Result};

/// Runtime settings for one pipeline invocation.
///
/// Resolution order: built-in defaults, then the optional TOML file, then
/// `TRENDING_*` environment variables (a `.env` file is honoured). CLI flags
/// are applied on top by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub source_url: String,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub store_busy_timeout_ms: u64,
    pub report_top_n: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            store_busy_timeout_ms: DEFAULT_STORE_BUSY_TIMEOUT_MS,
            report_top_n: DEFAULT_REPORT_TOP_N,
        }
    }
}

impl PipelineSettings {
    /// Load settings from `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut settings = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PipelineError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: PipelineSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// A zero fetch timeout would make every request fail immediately.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "fetch_timeout_secs must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `TRENDING_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TRENDING_SOURCE_URL").filter(|v| !v.trim().is_empty()) {
            self.source_url = url;
        }
        if let Some(db) = lookup("TRENDING_DB_PATH").filter(|v| !v.trim().is_empty()) {
            self.db_path = PathBuf::from(db);
        }
        if let Some(out) = lookup("TRENDING_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(out);
        }
        if let Some(secs) = parse_env(&lookup, "TRENDING_FETCH_TIMEOUT_SECS")? {
            self.fetch_timeout_secs = secs;
        }
        if let Some(ms) = parse_env(&lookup, "TRENDING_STORE_BUSY_TIMEOUT_MS")? {
            self.store_busy_timeout_ms = ms;
        }
        if let Some(top_n) = parse_env(&lookup, "TRENDING_REPORT_TOP_N")? {
            self.report_top_n = top_n;
        }
        self.validate()?;
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn store_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }
}

/// Read a whole-number override; blank values are ignored.
fn parse_env<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            PipelineError::Config(format!("{} must be a whole number, got '{}'", key, value))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = PipelineSettings::from_toml_str(
            r#"
            source_url = "https://github.com/trending/rust?since=daily"
            report_top_n = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.source_url, "https://github.com/trending/rust?since=daily");
        assert_eq!(settings.report_top_n, 5);
        assert_eq!(settings.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(settings.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TRENDING_DB_PATH", "/tmp/t.db"),
            ("TRENDING_FETCH_TIMEOUT_SECS", "5"),
            ("TRENDING_SOURCE_URL", "  "),
        ]
        .into_iter()
        .collect();

        let mut settings = PipelineSettings::default();
        settings
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.db_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(5));
        // blank values are ignored
        assert_eq!(settings.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_env_overrides_store_and_report_settings() {
        let env: HashMap<&str, &str> = [
            ("TRENDING_STORE_BUSY_TIMEOUT_MS", "250"),
            ("TRENDING_REPORT_TOP_N", "3"),
        ]
        .into_iter()
        .collect();

        let mut settings = PipelineSettings::default();
        settings
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.store_busy_timeout(), Duration::from_millis(250));
        assert_eq!(settings.report_top_n, 3);
    }

    #[test]
    fn test_zero_fetch_timeout_is_rejected() {
        let mut settings = PipelineSettings::default();
        let err = settings
            .apply_env(|k| (k == "TRENDING_FETCH_TIMEOUT_SECS").then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = PipelineSettings::from_toml_str("fetch_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let mut settings = PipelineSettings::default();
        let err = settings
            .apply_env(|k| (k == "TRENDING_FETCH_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
