//! Quality Gate: the fixed rule set and the resolver that repairs what it finds.
//!
//! Rules never mutate their input and never look at the clock, so evaluating
//! the same raw collection twice yields identical findings.

pub mod coerce;
pub mod resolver;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::common::constants::{
    CHECK_DUPLICATES, CHECK_EXTRACTION_ANOMALY, CHECK_MISSING_VALUES, CHECK_TYPE_VALIDITY,
    CHECK_URL_VALIDITY, FIELD_DESCRIPTION, FIELD_FORKS_RAW, FIELD_LANGUAGE, FIELD_STARS_RAW,
};
use crate::domain::{is_missing, RawRecord};
use coerce::coerce_optional;

pub use resolver::{Repair, RepairKind, Resolution, ResolutionStats, Resolver};

/// Scheme followed by `://` and a non-empty host, optional port and path.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[A-Za-z0-9\-._~%]+(?::\d+)?(?:[/?#]\S*)?$")
        .expect("url pattern compiles")
});

/// Structural url test: scheme plus host, no whitespace.
pub fn is_well_formed_url(url: &str) -> bool {
    URL_PATTERN.is_match(url)
}

/// The closed set of quality checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    MissingValues,
    Duplicates,
    TypeValidity,
    UrlValidity,
    ExtractionAnomaly,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::MissingValues,
        CheckKind::Duplicates,
        CheckKind::TypeValidity,
        CheckKind::UrlValidity,
        CheckKind::ExtractionAnomaly,
    ];

    /// Stable identifier persisted as `quality_checks.check_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::MissingValues => CHECK_MISSING_VALUES,
            CheckKind::Duplicates => CHECK_DUPLICATES,
            CheckKind::TypeValidity => CHECK_TYPE_VALIDITY,
            CheckKind::UrlValidity => CHECK_URL_VALIDITY,
            CheckKind::ExtractionAnomaly => CHECK_EXTRACTION_ANOMALY,
        }
    }

    pub fn evaluate(&self, records: &[RawRecord]) -> Finding {
        match self {
            CheckKind::MissingValues => check_missing_values(records),
            CheckKind::Duplicates => check_duplicates(records),
            CheckKind::TypeValidity => check_type_validity(records),
            CheckKind::UrlValidity => check_url_validity(records),
            CheckKind::ExtractionAnomaly => check_extraction_anomaly(records),
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points at one raw record by scan position and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub index: usize,
    pub name: String,
}

impl RecordRef {
    fn new(index: usize, record: &RawRecord) -> Self {
        Self {
            index,
            name: record.name.clone(),
        }
    }
}

/// Rule-specific payload of a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingDetail {
    /// Field name to number of records where it is absent or blank
    MissingValues { missing: BTreeMap<String, usize> },
    /// Names that occur more than once, in first-seen order
    Duplicates { duplicate_names: Vec<String> },
    /// Records with at least one count that cannot be coerced to a whole number
    TypeValidity { unrepairable: usize },
    /// Urls that failed the structural test
    UrlValidity { invalid_urls: Vec<String> },
    /// Records whose trending metric is zero despite having stars
    ExtractionAnomaly { suspicious: usize },
}

/// The result of evaluating one rule over the whole raw collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub check: CheckKind,
    pub passed: bool,
    pub detail: FindingDetail,
    pub affected: Vec<RecordRef>,
}

impl Finding {
    /// Number of anomalies this finding reports
    pub fn anomaly_count(&self) -> usize {
        match &self.detail {
            FindingDetail::MissingValues { missing } => missing.values().sum(),
            FindingDetail::Duplicates { duplicate_names } => duplicate_names.len(),
            FindingDetail::TypeValidity { unrepairable } => *unrepairable,
            FindingDetail::UrlValidity { invalid_urls } => invalid_urls.len(),
            FindingDetail::ExtractionAnomaly { suspicious } => *suspicious,
        }
    }

    /// One-line, deterministic description used as the audit `check_result`
    pub fn summary(&self) -> String {
        match &self.detail {
            FindingDetail::MissingValues { missing } => {
                let counts: Vec<String> = missing.iter().map(|(f, n)| format!("{}={}", f, n)).collect();
                format!("missing values: {}", counts.join(", "))
            }
            FindingDetail::Duplicates { duplicate_names } if duplicate_names.is_empty() => {
                "no duplicate names".to_string()
            }
            FindingDetail::Duplicates { duplicate_names } => format!(
                "{} duplicate name(s): {}",
                duplicate_names.len(),
                duplicate_names.join(", ")
            ),
            FindingDetail::TypeValidity { unrepairable: 0 } => "all counts coercible".to_string(),
            FindingDetail::TypeValidity { unrepairable } => format!(
                "{} record(s) with unrepairable counts: {}",
                unrepairable,
                self.affected_names()
            ),
            FindingDetail::UrlValidity { invalid_urls } if invalid_urls.is_empty() => {
                "all urls well-formed".to_string()
            }
            FindingDetail::UrlValidity { invalid_urls } => {
                let pairs: Vec<String> = self
                    .affected
                    .iter()
                    .zip(invalid_urls)
                    .map(|(r, url)| format!("{} ({:?})", r.name, url))
                    .collect();
                format!("{} invalid url(s): {}", invalid_urls.len(), pairs.join(", "))
            }
            FindingDetail::ExtractionAnomaly { suspicious: 0 } => {
                "no zero-growth anomalies".to_string()
            }
            FindingDetail::ExtractionAnomaly { suspicious } => format!(
                "{} record(s) suspicious, needs manual review: {}",
                suspicious,
                self.affected_names()
            ),
        }
    }

    fn affected_names(&self) -> String {
        self.affected
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Run every rule, in order, over the same snapshot.
pub fn evaluate_all(records: &[RawRecord]) -> Vec<Finding> {
    CheckKind::ALL.iter().map(|check| check.evaluate(records)).collect()
}

fn check_missing_values(records: &[RawRecord]) -> Finding {
    let mut missing: BTreeMap<String, usize> = [
        FIELD_DESCRIPTION,
        FIELD_LANGUAGE,
        FIELD_STARS_RAW,
        FIELD_FORKS_RAW,
    ]
    .iter()
    .map(|f| (f.to_string(), 0))
    .collect();
    let mut affected = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let fields = [
            (FIELD_DESCRIPTION, &record.description),
            (FIELD_LANGUAGE, &record.language),
            (FIELD_STARS_RAW, &record.stars_raw),
            (FIELD_FORKS_RAW, &record.forks_raw),
        ];
        let mut any = false;
        for (field, value) in fields {
            if is_missing(value) {
                *missing.entry(field.to_string()).or_default() += 1;
                any = true;
            }
        }
        if any {
            affected.push(RecordRef::new(index, record));
        }
    }

    Finding {
        check: CheckKind::MissingValues,
        passed: affected.is_empty(),
        detail: FindingDetail::MissingValues { missing },
        affected,
    }
}

fn check_duplicates(records: &[RawRecord]) -> Finding {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for record in records.iter().filter(|r| !r.name.trim().is_empty()) {
        *occurrences.entry(record.name.as_str()).or_default() += 1;
    }

    let mut duplicate_names: Vec<String> = Vec::new();
    let mut affected = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if occurrences.get(record.name.as_str()).copied().unwrap_or(0) > 1 {
            if !duplicate_names.contains(&record.name) {
                duplicate_names.push(record.name.clone());
            }
            affected.push(RecordRef::new(index, record));
        }
    }

    Finding {
        check: CheckKind::Duplicates,
        passed: duplicate_names.is_empty(),
        detail: FindingDetail::Duplicates { duplicate_names },
        affected,
    }
}

fn check_type_validity(records: &[RawRecord]) -> Finding {
    let affected: Vec<RecordRef> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            coerce_optional(r.stars_raw.as_deref()).is_err()
                || coerce_optional(r.forks_raw.as_deref()).is_err()
        })
        .map(|(i, r)| RecordRef::new(i, r))
        .collect();

    Finding {
        check: CheckKind::TypeValidity,
        passed: affected.is_empty(),
        detail: FindingDetail::TypeValidity {
            unrepairable: affected.len(),
        },
        affected,
    }
}

fn check_url_validity(records: &[RawRecord]) -> Finding {
    let mut invalid_urls = Vec::new();
    let mut affected = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if !is_well_formed_url(&record.url) {
            invalid_urls.push(record.url.clone());
            affected.push(RecordRef::new(index, record));
        }
    }

    Finding {
        check: CheckKind::UrlValidity,
        passed: affected.is_empty(),
        detail: FindingDetail::UrlValidity { invalid_urls },
        affected,
    }
}

/// A zero growth figure on an already-starred repository usually means the
/// figure failed to extract. This is a heuristic, so it only ever flags.
fn check_extraction_anomaly(records: &[RawRecord]) -> Finding {
    let affected: Vec<RecordRef> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.trending_metric == 0.0 && coerce_optional(r.stars_raw.as_deref()).unwrap_or(0) > 0
        })
        .map(|(i, r)| RecordRef::new(i, r))
        .collect();

    Finding {
        check: CheckKind::ExtractionAnomaly,
        passed: affected.is_empty(),
        detail: FindingDetail::ExtractionAnomaly {
            suspicious: affected.len(),
        },
        affected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(name: &str, stars: &str, forks: &str) -> RawRecord {
        let mut r = RawRecord::new(
            name,
            format!("https://github.com/{}", name),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        );
        r.description = Some("A repository".to_string());
        r.language = Some("Rust".to_string());
        r.stars_raw = Some(stars.to_string());
        r.forks_raw = Some(forks.to_string());
        r.trending_metric = 10.0;
        r
    }

    fn finding(findings: &[Finding], check: CheckKind) -> &Finding {
        findings.iter().find(|f| f.check == check).unwrap()
    }

    #[test]
    fn test_every_rule_reports_on_clean_input() {
        let records = vec![raw("a/one", "10", "1"), raw("b/two", "1,000", "20")];
        let findings = evaluate_all(&records);

        assert_eq!(findings.len(), CheckKind::ALL.len());
        let order: Vec<CheckKind> = findings.iter().map(|f| f.check).collect();
        assert_eq!(order, CheckKind::ALL.to_vec());
        assert!(findings.iter().all(|f| f.passed && f.affected.is_empty()));
        assert_eq!(
            finding(&findings, CheckKind::MissingValues).summary(),
            "missing values: description=0, forks_raw=0, language=0, stars_raw=0"
        );
    }

    #[test]
    fn test_rules_are_idempotent() {
        let mut odd = raw("c/three", "", "x");
        odd.url = "not-a-url".to_string();
        odd.language = None;
        let records = vec![raw("a/one", "5", "1"), odd, raw("a/one", "6", "2")];

        let first = evaluate_all(&records);
        let second = evaluate_all(&records);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_values_counts_per_field() {
        let mut a = raw("a/one", "1", "1");
        a.description = None;
        a.language = Some("  ".to_string());
        let mut b = raw("b/two", "1", "1");
        b.description = Some(String::new());
        b.forks_raw = None;

        let f = check_missing_values(&[a, b, raw("c/three", "1", "1")]);
        let FindingDetail::MissingValues { missing } = &f.detail else {
            panic!("wrong detail");
        };
        assert_eq!(missing[FIELD_DESCRIPTION], 2);
        assert_eq!(missing[FIELD_LANGUAGE], 1);
        assert_eq!(missing[FIELD_FORKS_RAW], 1);
        assert_eq!(missing[FIELD_STARS_RAW], 0);
        assert!(!f.passed);
        assert_eq!(f.affected.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_duplicates_lists_each_name_once() {
        let records = vec![
            raw("a/one", "1", "1"),
            raw("b/two", "1", "1"),
            raw("a/one", "2", "1"),
            raw("a/one", "3", "1"),
            raw("b/two", "1", "1"),
            raw("c/three", "1", "1"),
        ];
        let f = check_duplicates(&records);
        assert_eq!(
            f.detail,
            FindingDetail::Duplicates {
                duplicate_names: vec!["a/one".to_string(), "b/two".to_string()]
            }
        );
        assert_eq!(f.anomaly_count(), 2);
        assert_eq!(f.affected.len(), 5);
    }

    #[test]
    fn test_duplicates_ignore_blank_names() {
        let f = check_duplicates(&[raw("", "1", "1"), raw(" ", "1", "1"), raw("", "1", "1")]);
        assert!(f.passed);
    }

    #[test]
    fn test_type_validity_only_flags_digitless_values() {
        let records = vec![
            raw("a/one", "1,234", "10"),
            raw("b/two", "", "3"),
            raw("c/three", "12", "n/a"),
            raw("d/four", "1k", "0"),
        ];
        let f = check_type_validity(&records);
        assert_eq!(f.detail, FindingDetail::TypeValidity { unrepairable: 2 });
        assert_eq!(
            f.affected.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["b/two", "c/three"]
        );
    }

    #[test]
    fn test_url_validity() {
        assert!(is_well_formed_url("https://github.com/rust-lang/rust"));
        assert!(is_well_formed_url("http://localhost:8080/x?y=1"));
        assert!(!is_well_formed_url("not-a-url"));
        assert!(!is_well_formed_url("https://"));
        assert!(!is_well_formed_url("https://github.com/a b"));
        assert!(!is_well_formed_url(""));

        let mut bad = raw("a/one", "1", "1");
        bad.url = "not-a-url".to_string();
        let f = check_url_validity(&[bad, raw("b/two", "1", "1")]);
        assert_eq!(f.anomaly_count(), 1);
        assert_eq!(f.summary(), "1 invalid url(s): a/one (\"not-a-url\")");
    }

    #[test]
    fn test_extraction_anomaly_needs_stars() {
        let mut suspicious = raw("a/one", "500", "1");
        suspicious.trending_metric = 0.0;
        let mut quiet = raw("b/two", "0", "1");
        quiet.trending_metric = 0.0;
        let mut unparsed = raw("c/three", "", "1");
        unparsed.trending_metric = 0.0;

        let f = check_extraction_anomaly(&[suspicious, quiet, unparsed, raw("d/four", "9", "1")]);
        assert_eq!(f.detail, FindingDetail::ExtractionAnomaly { suspicious: 1 });
        assert_eq!(f.summary(), "1 record(s) suspicious, needs manual review: a/one");
    }
}
