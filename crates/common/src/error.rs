/// VecRoute error types
#[derive(Debug, thiserror::Error)]
pub enum VecRouteError {
    /// Vector length does not match the declared or configured dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Structurally invalid input (bad identifier, bad parameter, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend probe failed on an explicit request for that backend
    #[error("Backend '{backend}' unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    /// External record store failure
    #[error("Record store error: {0}")]
    Store(String),

    /// SQL engine failure
    #[error("SQL error: {0}")]
    Sql(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VecRouteError {
    /// Create dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Create validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create unavailable error
    pub fn unavailable<B: Into<String>, R: Into<String>>(backend: B, reason: R) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Create record store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Create SQL error
    pub fn sql<S: Into<String>>(msg: S) -> Self {
        Self::Sql(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error was raised by input validation, before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. } | Self::Validation(_))
    }

    /// Whether this error came from an explicit backend request that failed its probe
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
