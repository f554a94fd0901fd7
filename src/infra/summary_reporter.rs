use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app::ports::{ReportOutcome, ReporterPort};
use crate::common::error::{PipelineError, Result};
use crate::domain::{Record, UrlStatus};

const BAR_WIDTH: usize = 40;

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub total_stars: u64,
    pub invalid_urls: usize,
    pub languages: BTreeMap<String, usize>,
    pub top: Vec<TopRepository>,
}

#[derive(Debug, Serialize)]
pub struct TopRepository {
    pub name: String,
    pub url: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub trending_metric: f64,
}

impl ReportSummary {
    pub fn build(run_id: Uuid, records: &[Record], top_n: usize) -> Self {
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            *languages.entry(record.language.clone()).or_default() += 1;
        }

        let mut ranked: Vec<&Record> = records.iter().collect();
        ranked.sort_by(|a, b| b.stars.cmp(&a.stars).then_with(|| a.name.cmp(&b.name)));
        let top = ranked
            .into_iter()
            .take(top_n)
            .map(|r| TopRepository {
                name: r.name.clone(),
                url: r.url.clone(),
                language: r.language.clone(),
                stars: r.stars,
                forks: r.forks,
                trending_metric: r.trending_metric,
            })
            .collect();

        Self {
            run_id,
            generated_at: Utc::now(),
            total_records: records.len(),
            total_stars: records.iter().map(|r| r.stars).fold(0u64, u64::saturating_add),
            invalid_urls: records.iter().filter(|r| r.url_status == UrlStatus::Invalid).count(),
            languages,
            top,
        }
    }

    /// Markdown with text bar charts for stars and language share
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Trending repositories");
        let _ = writeln!(out);
        let _ = writeln!(out, "Run `{}` at {}", self.run_id, self.generated_at.to_rfc3339());
        let _ = writeln!(
            out,
            "{} repositories, {} stars in total, {} url(s) flagged for review",
            self.total_records, self.total_stars, self.invalid_urls
        );

        let _ = writeln!(out, "\n## Top {} by stars\n", self.top.len());
        let _ = writeln!(out, "```");
        let max_stars = self.top.iter().map(|t| t.stars).max().unwrap_or(0);
        let name_width = self.top.iter().map(|t| t.name.len()).max().unwrap_or(0);
        for t in &self.top {
            let _ = writeln!(
                out,
                "{:<width$} | {} {}",
                t.name,
                bar(t.stars, max_stars),
                t.stars,
                width = name_width
            );
        }
        let _ = writeln!(out, "```");

        let _ = writeln!(out, "\n## Languages\n");
        let _ = writeln!(out, "```");
        let mut by_count: Vec<(&String, &usize)> = self.languages.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let max_count = by_count.first().map(|(_, c)| **c as u64).unwrap_or(0);
        let lang_width = by_count.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        for (language, count) in by_count {
            let _ = writeln!(
                out,
                "{:<width$} | {} {}",
                language,
                bar(*count as u64, max_count),
                count,
                width = lang_width
            );
        }
        let _ = writeln!(out, "```");
        out
    }
}

fn bar(value: u64, max: u64) -> String {
    if max == 0 {
        return String::new();
    }
    let len = ((value as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len.max(usize::from(value > 0)))
}

/// Writes `report_<run_id>.md` and `report_<run_id>.json` into the output directory.
pub struct SummaryReporter {
    output_dir: PathBuf,
    top_n: usize,
}

impl SummaryReporter {
    pub fn new(output_dir: impl Into<PathBuf>, top_n: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            top_n,
        }
    }
}

#[async_trait]
impl ReporterPort for SummaryReporter {
    #[instrument(skip(self, records), fields(output_dir = %self.output_dir.display()))]
    async fn report(&self, run_id: Uuid, records: &[Record]) -> Result<ReportOutcome> {
        let summary = ReportSummary::build(run_id, records, self.top_n);

        fs::create_dir_all(&self.output_dir).map_err(|e| PipelineError::Report {
            message: format!("cannot create {}: {}", self.output_dir.display(), e),
        })?;

        let markdown_path = self.output_dir.join(format!("report_{}.md", run_id));
        let json_path = self.output_dir.join(format!("report_{}.json", run_id));

        fs::write(&markdown_path, summary.to_markdown()).map_err(|e| PipelineError::Report {
            message: format!("cannot write {}: {}", markdown_path.display(), e),
        })?;
        fs::write(&json_path, serde_json::to_string_pretty(&summary)?).map_err(|e| {
            PipelineError::Report {
                message: format!("cannot write {}: {}", json_path.display(), e),
            }
        })?;

        info!("Wrote report for {} repositories", summary.total_records);
        Ok(ReportOutcome {
            artifacts: vec![markdown_path, json_path],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(name: &str, language: &str, stars: u64) -> Record {
        Record {
            name: name.to_string(),
            url: format!("https://github.com/{}", name),
            url_status: UrlStatus::Valid,
            description: String::new(),
            language: language.to_string(),
            stars,
            forks: 0,
            trending_metric: 1.0,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_ranks_and_counts() {
        let records = vec![
            record("a/a", "Rust", 10),
            record("b/b", "Go", 300),
            record("c/c", "Rust", 20),
        ];
        let summary = ReportSummary::build(Uuid::nil(), &records, 2);

        assert_eq!(summary.total_stars, 330);
        assert_eq!(summary.languages["Rust"], 2);
        let top: Vec<&str> = summary.top.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(top, vec!["b/b", "c/c"]);

        let md = summary.to_markdown();
        assert!(md.contains("## Top 2 by stars"));
        assert!(md.contains(&"█".repeat(BAR_WIDTH)));
    }

    #[test]
    fn test_bar_scaling() {
        assert_eq!(bar(0, 0), "");
        assert_eq!(bar(0, 10), "");
        // a tiny non-zero value still gets one block
        assert_eq!(bar(1, 1_000_000).chars().count(), 1);
        assert_eq!(bar(5, 10).chars().count(), BAR_WIDTH / 2);
    }

    #[tokio::test]
    async fn test_report_writes_both_files() {
        let dir = tempdir().unwrap();
        let reporter = SummaryReporter::new(dir.path().join("out"), 5);
        let outcome = reporter
            .report(Uuid::new_v4(), &[record("a/a", "Rust", 1)])
            .await
            .unwrap();

        assert_eq!(outcome.artifacts.len(), 2);
        assert!(outcome.artifacts.iter().all(|p| p.exists()));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&outcome.artifacts[1]).unwrap()).unwrap();
        assert_eq!(json["total_records"], 1);
    }
}
