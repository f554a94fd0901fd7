use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::processing::quality_gate::{Finding, Repair};

/// One persisted line of the audit trail: a rule evaluation or a repair action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub check_type: String,
    pub check_result: String,
    pub checked_at: DateTime<Utc>,
}

/// Append-only record of what happened during one run.
///
/// Entries keep the order they were recorded in and cannot be edited.
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    clock: fn() -> DateTime<Utc>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Use a fixed time source, mostly for tests
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            entries: Vec::new(),
            clock,
        }
    }

    pub fn record_finding(&mut self, finding: &Finding) {
        let prefix = if finding.passed { "PASS" } else { "FAIL" };
        self.push(
            finding.check.as_str(),
            format!("{}: {}", prefix, finding.summary()),
        );
    }

    pub fn record_repair(&mut self, repair: &Repair) {
        self.push(repair.kind.as_str(), repair.detail.clone());
    }

    fn push(&mut self, check_type: &str, check_result: String) {
        self.entries.push(AuditEntry {
            check_type: check_type.to_string(),
            check_result,
            checked_at: (self.clock)(),
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }
}
