/// Identifier constants to keep the audit trail consistent across the codebase.
/// These values are persisted in `quality_checks.check_type`, so they must not change.

// Quality check identifiers (one per rule, in evaluation order)
pub const CHECK_MISSING_VALUES: &str = "missing_values";
pub const CHECK_DUPLICATES: &str = "duplicates";
pub const CHECK_TYPE_VALIDITY: &str = "type_validity";
pub const CHECK_URL_VALIDITY: &str = "url_validity";
pub const CHECK_EXTRACTION_ANOMALY: &str = "extraction_anomaly";

// Repair action identifiers
pub const REPAIR_IMPUTATION: &str = "imputation";
pub const REPAIR_DEDUP_REMOVAL: &str = "dedup_removal";
pub const REPAIR_COERCION_FAILURE: &str = "coercion_failure";
pub const REPAIR_URL_FLAGGED: &str = "url_flagged";
pub const REPAIR_BLANK_NAME_DROPPED: &str = "blank_name_dropped";

// Field names as they appear in raw source mappings
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_LANGUAGE: &str = "language";
pub const FIELD_STARS_RAW: &str = "stars_raw";
pub const FIELD_FORKS_RAW: &str = "forks_raw";

// Imputation defaults
pub const DEFAULT_DESCRIPTION: &str = "";
pub const DEFAULT_LANGUAGE: &str = "Unknown";
pub const DEFAULT_COUNT: u64 = 0;

// Source defaults
pub const DEFAULT_SOURCE_URL: &str = "https://github.com/trending";
pub const GITHUB_BASE_URL: &str = "https://github.com";
pub const DEFAULT_DB_PATH: &str = "data/trending.db";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_CONFIG_FILE: &str = "trending.toml";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REPORT_TOP_N: usize = 10;

// User agent sent with source requests
pub const USER_AGENT: &str = concat!("trending_scraper/", env!("CARGO_PKG_VERSION"));
