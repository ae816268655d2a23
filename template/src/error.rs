use thiserror::Error;

use crate::repair::Strategy;

/// Errors returned while turning template text into bytes.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template: empty payload")]
    Empty,

    #[error("template: invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors returned by the repair pipeline.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("repair: missing PNG signature")]
    BadSignature,

    #[error("repair: {strategy} failed: {reason}")]
    Strategy { strategy: Strategy, reason: String },

    #[error("repair: all {attempts} strategies failed")]
    Exhausted { attempts: usize },

    #[error("repair: io: {0}")]
    Io(#[from] std::io::Error),
}
