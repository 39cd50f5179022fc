//! Domain error types.

/// Top-level error type for metalwatch.
#[derive(Debug, thiserror::Error)]
pub enum MetalwatchError {
    #[error("invalid tick: {reason}")]
    InvalidTick { reason: String },

    #[error("insufficient data: have {available} points, need {needed}")]
    InsufficientData { available: usize, needed: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{resource} unavailable: {reason}")]
    ExternalResourceUnavailable { resource: String, reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("csv error: {reason}")]
    Csv { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MetalwatchError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        MetalwatchError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the "not enough history yet" state callers are expected to handle.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, MetalwatchError::InsufficientData { .. })
    }
}

impl From<&MetalwatchError> for std::process::ExitCode {
    fn from(err: &MetalwatchError) -> Self {
        let code: u8 = match err {
            MetalwatchError::Io(_) => 1,
            MetalwatchError::ConfigParse { .. }
            | MetalwatchError::ConfigMissing { .. }
            | MetalwatchError::ConfigInvalid { .. } => 2,
            MetalwatchError::Storage { .. } | MetalwatchError::Csv { .. } => 3,
            MetalwatchError::InvalidTick { .. } | MetalwatchError::InvalidParameter { .. } => 4,
            MetalwatchError::InsufficientData { .. } => 5,
            MetalwatchError::ExternalResourceUnavailable { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
