use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch failed: {message}")]
    Fetch { message: String },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Stored data unreadable: {0}")]
    Data(String),

    #[error("Report failed: {message}")]
    Report { message: String },
}

/// A single raw count that cannot be turned into a whole number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionFailure {
    #[error("value {raw:?} contains no digits")]
    NoDigits { raw: String },

    #[error("value {raw:?} is not a whole number")]
    Fractional { raw: String },
}

impl CoercionFailure {
    pub fn raw(&self) -> &str {
        match self {
            CoercionFailure::NoDigits { raw } | CoercionFailure::Fractional { raw } => raw,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
