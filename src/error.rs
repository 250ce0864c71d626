use thiserror::Error;

/// Raised while loading configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to load env file {path}: {message}")]
    EnvFile { path: String, message: String },

    #[error("invalid time zone offset '{0}' (expected e.g. +05:30)")]
    InvalidTimeZone(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must not be empty")]
    Missing(&'static str),
}

/// A completion provider call failed. Always recoverable.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no completion provider is configured")]
    NotConfigured,

    #[error("{provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{0} returned an empty completion")]
    EmptyResponse(String),

    #[error("all providers failed, last error: {0}")]
    AllFailed(String),
}

/// Why a single event draft was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("summary is required")]
    MissingSummary,

    #[error("start time is required")]
    MissingStart,

    #[error("end time is required")]
    MissingEnd,

    #[error("invalid {field} timestamp '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("start must be before end")]
    EmptyInterval,
}

/// Model output could not be turned into events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed plan: {0}")]
    Malformed(String),

    #[error("invalid event at position {index}: {reason}")]
    InvalidEvent {
        index: usize,
        reason: ValidationError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read events: {0}")]
    Read(String),

    #[error("failed to write event: {0}")]
    Write(String),

    #[error("no matching event found")]
    NotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
