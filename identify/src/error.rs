use fpid_template::RepairError;
use thiserror::Error;

/// Errors returned while decoding an image and extracting its features.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("features: decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("features: extraction failed: {0}")]
    Extraction(String),

    #[error("features: no descriptors extracted")]
    NoDescriptors,
}

/// Errors returned while loading an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config: json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: unsupported file extension {0:?}")]
    UnsupportedFormat(String),

    #[error("config: invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Why a probe or candidate image could not be used for scoring.
///
/// Candidate-level errors skip that candidate and count it as corrupted;
/// only [`IdentifyError::ProbeUnusable`] ends a request early.
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    #[error(transparent)]
    RepairExhausted(#[from] RepairError),

    #[error("no features extracted")]
    NoFeatures,

    #[error("probe unusable: {0}")]
    ProbeUnusable(String),
}

impl From<FeatureError> for IdentifyError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::Decode(e) => Self::DecodeFailure(e.to_string()),
            FeatureError::Extraction(_) | FeatureError::NoDescriptors => Self::NoFeatures,
        }
    }
}
