//! Domain error types.
//!
//! Only configuration and data-loading failures are errors. Arithmetic edge
//! cases inside a run resolve to deterministic fallbacks, and broken internal
//! invariants panic.

/// Top-level error type for phasetrader.
#[derive(Debug, thiserror::Error)]
pub enum PhaseTraderError {
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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PhaseTraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PhaseTraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&PhaseTraderError> for std::process::ExitCode {
    fn from(err: &PhaseTraderError) -> Self {
        let code: u8 = match err {
            PhaseTraderError::Io(_) => 1,
            PhaseTraderError::ConfigParse { .. }
            | PhaseTraderError::ConfigMissing { .. }
            | PhaseTraderError::ConfigInvalid { .. } => 2,
            PhaseTraderError::Csv(_) | PhaseTraderError::Data { .. } => 3,
            PhaseTraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
