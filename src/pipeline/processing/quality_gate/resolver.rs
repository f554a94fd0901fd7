use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

use super::coerce::coerce_optional;
use super::{is_well_formed_url, CheckKind, Finding};
use crate::common::constants::{
    DEFAULT_COUNT, DEFAULT_DESCRIPTION, DEFAULT_LANGUAGE, FIELD_DESCRIPTION, FIELD_FORKS_RAW,
    FIELD_LANGUAGE, FIELD_STARS_RAW, REPAIR_BLANK_NAME_DROPPED, REPAIR_COERCION_FAILURE,
    REPAIR_DEDUP_REMOVAL, REPAIR_IMPUTATION, REPAIR_URL_FLAGGED,
};
use crate::domain::{is_missing, RawRecord, Record, UrlStatus};
use crate::observability::metrics;

/// Kinds of repair the resolver can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    Imputation,
    DedupRemoval,
    CoercionFailure,
    UrlFlagged,
    BlankNameDropped,
}

impl RepairKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairKind::Imputation => REPAIR_IMPUTATION,
            RepairKind::DedupRemoval => REPAIR_DEDUP_REMOVAL,
            RepairKind::CoercionFailure => REPAIR_COERCION_FAILURE,
            RepairKind::UrlFlagged => REPAIR_URL_FLAGGED,
            RepairKind::BlankNameDropped => REPAIR_BLANK_NAME_DROPPED,
        }
    }
}

impl fmt::Display for RepairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repair action taken while cleaning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repair {
    pub kind: RepairKind,
    pub detail: String,
}

impl Repair {
    fn new(kind: RepairKind, detail: String) -> Self {
        metrics::quality::repair_applied(kind.as_str());
        Self { kind, detail }
    }
}

/// Counters describing what the resolver changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub input_records: usize,
    pub output_records: usize,
    pub blank_names_dropped: usize,
    pub imputed: BTreeMap<String, usize>,
    pub duplicates_removed: usize,
    pub coercion_failures: usize,
    pub urls_flagged: usize,
    pub anomalies_passed_through: usize,
}

/// Cleaned records plus the repairs that produced them
#[derive(Debug, Clone)]
pub struct Resolution {
    pub records: Vec<Record>,
    pub repairs: Vec<Repair>,
    pub stats: ResolutionStats,
}

/// Applies the repair policy for each rule.
///
/// Passes run in a fixed order: blank names, imputation, dedup, coercion,
/// url flagging. Coercion therefore only sees the rows that survive dedup.
#[derive(Debug, Clone)]
pub struct Resolver {
    pub description_default: String,
    pub language_default: String,
    pub count_default: u64,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            description_default: DEFAULT_DESCRIPTION.to_string(),
            language_default: DEFAULT_LANGUAGE.to_string(),
            count_default: DEFAULT_COUNT,
        }
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the raw collection and produce the cleaned one.
    pub fn resolve(&self, raw: Vec<RawRecord>, findings: &[Finding]) -> Resolution {
        let mut repairs = Vec::new();
        let mut stats = ResolutionStats {
            input_records: raw.len(),
            ..ResolutionStats::default()
        };

        let mut records = self.drop_blank_names(raw, &mut repairs, &mut stats);
        self.impute_missing(&mut records, findings, &mut repairs, &mut stats);
        if !passed(findings, CheckKind::Duplicates) {
            records = self.remove_duplicates(records, &mut repairs, &mut stats);
        }
        let mut cleaned = self.coerce_counts(records, &mut repairs, &mut stats);
        self.flag_urls(&mut cleaned, &mut repairs, &mut stats);

        if let Some(anomalies) = findings
            .iter()
            .find(|f| f.check == CheckKind::ExtractionAnomaly && !f.passed)
        {
            stats.anomalies_passed_through = anomalies.affected.len();
            info!(
                count = anomalies.affected.len(),
                "Extraction anomalies left unmodified for manual review"
            );
        }

        stats.output_records = cleaned.len();
        debug!(?stats, "Resolution finished");
        Resolution {
            records: cleaned,
            repairs,
            stats,
        }
    }

    fn drop_blank_names(
        &self,
        raw: Vec<RawRecord>,
        repairs: &mut Vec<Repair>,
        stats: &mut ResolutionStats,
    ) -> Vec<RawRecord> {
        let (kept, dropped): (Vec<RawRecord>, Vec<RawRecord>) =
            raw.into_iter().partition(|r| !r.name.trim().is_empty());

        if !dropped.is_empty() {
            let urls: Vec<&str> = dropped.iter().map(|r| r.url.as_str()).collect();
            warn!(count = dropped.len(), "Dropping records without a name");
            stats.blank_names_dropped = dropped.len();
            repairs.push(Repair::new(
                RepairKind::BlankNameDropped,
                format!(
                    "dropped {} record(s) with a blank name (urls: {})",
                    dropped.len(),
                    urls.join(", ")
                ),
            ));
        }
        kept
    }

    fn impute_missing(
        &self,
        records: &mut [RawRecord],
        findings: &[Finding],
        repairs: &mut Vec<Repair>,
        stats: &mut ResolutionStats,
    ) {
        let mut descriptions = 0;
        let mut languages = 0;
        for record in records.iter_mut() {
            if is_missing(&record.description) {
                record.description = Some(self.description_default.clone());
                descriptions += 1;
            }
            if is_missing(&record.language) {
                record.language = Some(self.language_default.clone());
                languages += 1;
            }
        }

        // Nothing to report when the missing-value rule came back clean
        if passed(findings, CheckKind::MissingValues) {
            return;
        }
        for (field, count, default) in [
            (FIELD_DESCRIPTION, descriptions, &self.description_default),
            (FIELD_LANGUAGE, languages, &self.language_default),
        ] {
            if count == 0 {
                continue;
            }
            stats.imputed.insert(field.to_string(), count);
            repairs.push(Repair::new(
                RepairKind::Imputation,
                format!("imputed {} on {} record(s) with {:?}", field, count, default),
            ));
        }
    }

    /// Keep the first occurrence of each name in scan order.
    fn remove_duplicates(
        &self,
        records: Vec<RawRecord>,
        repairs: &mut Vec<Repair>,
        stats: &mut ResolutionStats,
    ) -> Vec<RawRecord> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut removed: Vec<String> = Vec::new();
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            if seen.insert(record.name.clone()) {
                kept.push(record);
            } else {
                removed.push(record.name);
            }
        }

        if !removed.is_empty() {
            stats.duplicates_removed = removed.len();
            info!(removed = removed.len(), "Removed duplicate records");
            repairs.push(Repair::new(
                RepairKind::DedupRemoval,
                format!(
                    "removed {} duplicate row(s): {}",
                    removed.len(),
                    removed.join(", ")
                ),
            ));
        }
        kept
    }

    /// Every row survives; unrepairable counts take the default and are audited once each.
    fn coerce_counts(
        &self,
        records: Vec<RawRecord>,
        repairs: &mut Vec<Repair>,
        stats: &mut ResolutionStats,
    ) -> Vec<Record> {
        records
            .into_iter()
            .map(|raw| {
                let stars = self.coerce_field(&raw, FIELD_STARS_RAW, raw.stars_raw.as_deref(), repairs, stats);
                let forks = self.coerce_field(&raw, FIELD_FORKS_RAW, raw.forks_raw.as_deref(), repairs, stats);
                Record {
                    url_status: UrlStatus::Valid,
                    description: raw.description.unwrap_or_else(|| self.description_default.clone()),
                    language: raw.language.unwrap_or_else(|| self.language_default.clone()),
                    name: raw.name,
                    url: raw.url,
                    stars,
                    forks,
                    trending_metric: raw.trending_metric,
                    scraped_at: raw.scraped_at,
                }
            })
            .collect()
    }

    fn coerce_field(
        &self,
        record: &RawRecord,
        field: &'static str,
        value: Option<&str>,
        repairs: &mut Vec<Repair>,
        stats: &mut ResolutionStats,
    ) -> u64 {
        match coerce_optional(value) {
            Ok(n) => n,
            Err(failure) => {
                debug!(name = %record.name, field, raw = failure.raw(), "Coercion failed; using default");
                metrics::quality::coercion_failed(field);
                stats.coercion_failures += 1;
                repairs.push(Repair::new(
                    RepairKind::CoercionFailure,
                    format!(
                        "{} of {}: {}; defaulted to {}",
                        field, record.name, failure, self.count_default
                    ),
                ));
                self.count_default
            }
        }
    }

    /// Malformed urls pass through unchanged; guessing a fix is unsafe.
    fn flag_urls(&self, records: &mut [Record], repairs: &mut Vec<Repair>, stats: &mut ResolutionStats) {
        let mut flagged = Vec::new();
        for record in records.iter_mut() {
            if !is_well_formed_url(&record.url) {
                record.url_status = UrlStatus::Invalid;
                flagged.push(format!("{} ({:?})", record.name, record.url));
            }
        }

        if !flagged.is_empty() {
            stats.urls_flagged = flagged.len();
            repairs.push(Repair::new(
                RepairKind::UrlFlagged,
                format!(
                    "flagged {} url(s) for manual review: {}",
                    flagged.len(),
                    flagged.join(", ")
                ),
            ));
        }
    }
}

/// A rule counts as passed only if its finding is present and clean
fn passed(findings: &[Finding], check: CheckKind) -> bool {
    findings.iter().any(|f| f.check == check && f.passed)
}
