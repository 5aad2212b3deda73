use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedtraceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict { key: String, expected: i64, actual: i64 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for redtrace operations
pub type Result<T> = std::result::Result<T, RedtraceError>;

impl RedtraceError {
    /// Creates a new not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a new translation error
    pub fn translation<S: Into<String>>(msg: S) -> Self {
        Self::Translation(msg.into())
    }

    /// Creates a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Creates a new invalid-query error
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Creates a new parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true for the not-found kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Translation(_) => "translation",
            Self::Store(_) | Self::VersionConflict { .. } => "store",
            Self::InvalidQuery(_) => "validation",
            Self::Parse { .. } => "parse",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
