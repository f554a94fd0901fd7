use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One trending repository exactly as the source produced it.
///
/// Optional fields that the source did not provide deserialize as `None`.
/// Counts are kept as text until the resolver coerces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub stars_raw: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub forks_raw: Option<String>,
    #[serde(default, deserialize_with = "loose_metric")]
    pub trending_metric: f64,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>, scraped_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: None,
            language: None,
            stars_raw: None,
            forks_raw: None,
            trending_metric: 0.0,
            scraped_at,
        }
    }
}

/// True when an optional text field is absent or only whitespace
pub fn is_missing(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Whether a record's url passed the structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Valid,
    /// Kept unchanged for manual review
    Invalid,
}

/// A cleaned trending repository, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub url: String,
    pub url_status: UrlStatus,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub trending_metric: f64,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

// Sources sometimes hand counts over as JSON numbers rather than strings.
// A whole float becomes its integer text; a fractional one keeps its decimal
// text so coercion rejects it instead of reading the point as a separator.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
        Loose::Text(s) => s,
        Loose::Unsigned(n) => n.to_string(),
        Loose::Signed(n) => n.to_string(),
        Loose::Float(n) if n.is_finite() && n.fract() == 0.0 && n >= 0.0 => {
            // saturating cast
            (n as u64).to_string()
        }
        Loose::Float(n) => n.to_string(),
    }))
}

/// The growth figure as a number or numeric text. Anything unreadable is
/// `0.0`, which the extraction-anomaly rule then flags.
fn loose_metric<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let metric = match Option::<Loose>::deserialize(deserializer)? {
        None => 0.0,
        Some(Loose::Text(s)) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        Some(Loose::Unsigned(n)) => n as f64,
        Some(Loose::Signed(n)) => n as f64,
        Some(Loose::Float(n)) => n,
    };
    Ok(if metric.is_finite() { metric } else { 0.0 })
}
