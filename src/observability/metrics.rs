//! Metrics for the trending pipeline
//!
//! Metric names follow the Prometheus conventions. Recording is a no-op until
//! a recorder is installed with [`init`], so library code and tests can call
//! these functions unconditionally.

use once_cell::sync::OnceCell;
use std::fmt;
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourceRecordsFetched,
    SourceFetchDuration,

    // Quality metrics
    QualityChecksRun,
    QualityAnomaliesDetected,
    QualityRepairsApplied,
    QualityCoercionFailures,

    // Store metrics
    StoreRowsInserted,
    StoreRowsSkipped,

    // Pipeline metrics
    PipelineRunsCompleted,
    PipelineRunsFailed,
    PipelineRunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceRecordsFetched => "trending_source_records_fetched_total",
            MetricName::SourceFetchDuration => "trending_source_fetch_duration_seconds",

            MetricName::QualityChecksRun => "trending_quality_checks_run_total",
            MetricName::QualityAnomaliesDetected => "trending_quality_anomalies_detected_total",
            MetricName::QualityRepairsApplied => "trending_quality_repairs_applied_total",
            MetricName::QualityCoercionFailures => "trending_quality_coercion_failures_total",

            MetricName::StoreRowsInserted => "trending_store_rows_inserted_total",
            MetricName::StoreRowsSkipped => "trending_store_rows_skipped_total",

            MetricName::PipelineRunsCompleted => "trending_pipeline_runs_completed_total",
            MetricName::PipelineRunsFailed => "trending_pipeline_runs_failed_total",
            MetricName::PipelineRunDuration => "trending_pipeline_run_duration_seconds",
        }
    }

    /// Get all metric names (used to check naming conventions)
    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            SourceRecordsFetched,
            SourceFetchDuration,
            QualityChecksRun,
            QualityAnomaliesDetected,
            QualityRepairsApplied,
            QualityCoercionFailures,
            StoreRowsInserted,
            StoreRowsSkipped,
            PipelineRunsCompleted,
            PipelineRunsFailed,
            PipelineRunDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceCell<metrics_exporter_prometheus::PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder for this process
pub fn init() -> anyhow::Result<()> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics in Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod source {
    use super::MetricName;

    pub fn records_fetched(count: usize, duration_secs: f64) {
        ::metrics::counter!(MetricName::SourceRecordsFetched.as_str()).increment(count as u64);
        ::metrics::histogram!(MetricName::SourceFetchDuration.as_str()).record(duration_secs);
    }
}

pub mod quality {
    use super::MetricName;

    /// Record one rule evaluation and how many anomalies it reported
    pub fn check_run(check_type: &'static str, anomalies: usize) {
        ::metrics::counter!(MetricName::QualityChecksRun.as_str(), "check_type" => check_type)
            .increment(1);
        if anomalies > 0 {
            ::metrics::counter!(
                MetricName::QualityAnomaliesDetected.as_str(),
                "check_type" => check_type
            )
            .increment(anomalies as u64);
        }
    }

    pub fn repair_applied(repair_type: &'static str) {
        ::metrics::counter!(MetricName::QualityRepairsApplied.as_str(), "repair_type" => repair_type)
            .increment(1);
    }

    pub fn coercion_failed(field: &'static str) {
        ::metrics::counter!(MetricName::QualityCoercionFailures.as_str(), "field" => field)
            .increment(1);
    }
}

pub mod store {
    use super::MetricName;

    pub fn rows_written(inserted: usize, skipped: usize) {
        ::metrics::counter!(MetricName::StoreRowsInserted.as_str()).increment(inserted as u64);
        ::metrics::counter!(MetricName::StoreRowsSkipped.as_str()).increment(skipped as u64);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_completed(duration_secs: f64) {
        ::metrics::counter!(MetricName::PipelineRunsCompleted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::PipelineRunDuration.as_str()).record(duration_secs);
    }

    pub fn run_failed(stage: &'static str) {
        ::metrics::counter!(MetricName::PipelineRunsFailed.as_str(), "stage" => stage).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let names: Vec<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.iter().all(|n| n.starts_with("trending_")));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        quality::check_run("duplicates", 2);
        quality::repair_applied("dedup_removal");
        store::rows_written(3, 1);
    }
}
