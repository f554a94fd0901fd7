use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{RawRecord, Record};
use crate::pipeline::audit::AuditLog;
use crate::pipeline::processing::quality_gate::{
    evaluate_all, Finding, Repair, ResolutionStats, Resolver,
};

/// Use case that runs the rule set and then the resolver over one raw batch
pub struct QualityGateUseCase {
    resolver: Resolver,
    clock: fn() -> DateTime<Utc>,
}

/// Everything the quality gate produced for one batch
pub struct QualityGateOutcome {
    pub findings: Vec<Finding>,
    pub records: Vec<Record>,
    pub repairs: Vec<Repair>,
    pub stats: ResolutionStats,
    pub audit: AuditLog,
}

impl Default for QualityGateUseCase {
    fn default() -> Self {
        Self::new(Resolver::default())
    }
}

impl QualityGateUseCase {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            clock: Utc::now,
        }
    }

    /// Pin audit timestamps to a fixed source
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Evaluate every rule without repairing anything
    pub fn assess(&self, raw: &[RawRecord]) -> Vec<Finding> {
        let findings = evaluate_all(raw);
        for finding in &findings {
            crate::observability::metrics::quality::check_run(
                finding.check.as_str(),
                finding.anomaly_count(),
            );
            if finding.passed {
                info!(check = %finding.check, "{}", finding.summary());
            } else {
                warn!(check = %finding.check, anomalies = finding.anomaly_count(), "{}", finding.summary());
            }
        }
        findings
    }

    /// Assess, then resolve. Findings are audited before any repair.
    pub fn run(&self, raw: Vec<RawRecord>) -> QualityGateOutcome {
        let findings = self.assess(&raw);
        self.resolve_assessed(raw, findings)
    }

    /// Resolve a batch whose findings were already produced by [`Self::assess`]
    pub fn resolve_assessed(&self, raw: Vec<RawRecord>, findings: Vec<Finding>) -> QualityGateOutcome {
        let mut audit = AuditLog::with_clock(self.clock);
        for finding in &findings {
            audit.record_finding(finding);
        }

        let resolution = self.resolver.resolve(raw, &findings);
        for repair in &resolution.repairs {
            info!(repair = %repair.kind, "{}", repair.detail);
            audit.record_repair(repair);
        }

        QualityGateOutcome {
            findings,
            records: resolution.records,
            repairs: resolution.repairs,
            stats: resolution.stats,
            audit,
        }
    }
}
