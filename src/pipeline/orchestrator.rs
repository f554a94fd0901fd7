use serde::Serialize;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::app::ports::{PersistOutcome, ReportOutcome, ReporterPort, SourcePort, StorePort};
use crate::app::quality_gate_use_case::QualityGateUseCase;
use crate::common::error::PipelineError;
use crate::domain::Record;
use crate::observability::metrics;
use crate::pipeline::audit::AuditEntry;
use crate::pipeline::processing::quality_gate::{Finding, ResolutionStats};

/// Where a run is in its one-way trip from source to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Fetched,
    Validated,
    Cleaned,
    Persisted,
    Reported,
    Failed,
}

/// The I/O steps that can abort a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Persist,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Persist => "persist",
            Stage::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that ended in `FAILED`
#[derive(Debug, Error)]
#[error("run {run_id} failed during {stage}: {source}")]
pub struct RunFailure {
    pub run_id: Uuid,
    pub stage: Stage,
    /// States entered before the failure, ending with `Failed`
    pub states: Vec<RunState>,
    #[source]
    pub source: PipelineError,
}

/// A run that reached `REPORTED`
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub states: Vec<RunState>,
    pub raw_records: usize,
    pub findings: Vec<Finding>,
    pub stats: ResolutionStats,
    pub persisted: PersistOutcome,
    pub report: ReportOutcome,
    pub audit: Vec<AuditEntry>,
    pub records: Vec<Record>,
}

impl RunReport {
    pub fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Failed)
    }
}

/// Sequences fetch, quality gate, persistence and reporting exactly once per call.
///
/// Collaborators are injected, so a run has no process-wide state and the
/// same orchestrator can be run repeatedly.
pub struct Orchestrator {
    source: Box<dyn SourcePort>,
    store: Box<dyn StorePort>,
    reporter: Box<dyn ReporterPort>,
    quality_gate: QualityGateUseCase,
}

struct RunTracker {
    run_id: Uuid,
    states: Vec<RunState>,
}

impl RunTracker {
    fn enter(&mut self, state: RunState) {
        info!(run_id = %self.run_id, from = ?self.states.last(), to = ?state, "State transition");
        self.states.push(state);
    }

    fn fail(mut self, stage: Stage, source: PipelineError) -> RunFailure {
        error!(run_id = %self.run_id, %stage, error = %source, "❌ Run failed");
        metrics::pipeline::run_failed(stage.as_str());
        self.enter(RunState::Failed);
        RunFailure {
            run_id: self.run_id,
            stage,
            states: self.states,
            source,
        }
    }
}

impl Orchestrator {
    pub fn new(
        source: Box<dyn SourcePort>,
        store: Box<dyn StorePort>,
        reporter: Box<dyn ReporterPort>,
    ) -> Self {
        Self {
            source,
            store,
            reporter,
            quality_gate: QualityGateUseCase::default(),
        }
    }

    /// Run the full sequence once. No step is retried.
    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub async fn run(&self) -> Result<RunReport, RunFailure> {
        let started = Instant::now();
        let mut tracker = RunTracker {
            run_id: Uuid::new_v4(),
            states: Vec::new(),
        };
        info!(run_id = %tracker.run_id, "🚀 Starting trending pipeline run");

        let fetch_started = Instant::now();
        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => return Err(tracker.fail(Stage::Fetch, e)),
        };
        metrics::source::records_fetched(raw.len(), fetch_started.elapsed().as_secs_f64());
        let raw_records = raw.len();
        tracker.enter(RunState::Fetched);

        let findings = self.quality_gate.assess(&raw);
        tracker.enter(RunState::Validated);

        let outcome = self.quality_gate.resolve_assessed(raw, findings);
        tracker.enter(RunState::Cleaned);

        // Whole audit trail goes to the store together with the records
        let audit = outcome.audit.into_entries();
        let persisted = match self.store.persist(&outcome.records, &audit).await {
            Ok(p) => p,
            Err(e) => return Err(tracker.fail(Stage::Persist, e)),
        };
        metrics::store::rows_written(persisted.inserted, persisted.skipped_duplicates);
        tracker.enter(RunState::Persisted);

        let report = match self.reporter.report(tracker.run_id, &outcome.records).await {
            Ok(r) => r,
            Err(e) => return Err(tracker.fail(Stage::Report, e)),
        };
        tracker.enter(RunState::Reported);

        let elapsed = started.elapsed().as_secs_f64();
        metrics::pipeline::run_completed(elapsed);
        info!(
            run_id = %tracker.run_id,
            records = outcome.records.len(),
            inserted = persisted.inserted,
            skipped = persisted.skipped_duplicates,
            elapsed_secs = elapsed,
            "✅ Run reported"
        );

        Ok(RunReport {
            run_id: tracker.run_id,
            states: tracker.states,
            raw_records,
            findings: outcome.findings,
            stats: outcome.stats,
            persisted,
            report,
            audit,
            records: outcome.records,
        })
    }
}
