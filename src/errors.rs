use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecMeshError {
    /// The spectrum is excluded from the network, the run goes on.
    #[error("invalid spectrum '{id}': {reason}")]
    InvalidSpectrum { id: String, reason: String },

    /// Aborts the run before any spectrum is compared.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("missing column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("could not parse peak '{token}': {reason}")]
    PeakParse { token: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpecMeshError {
    pub fn invalid_spectrum(
        id: &str,
        reason: impl Into<String>,
    ) -> Self {
        SpecMeshError::InvalidSpectrum {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, SpecMeshError::InvalidSpectrum { .. })
    }
}

pub type Result<T> = std::result::Result<T, SpecMeshError>;
