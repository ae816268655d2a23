//! Fingerprint template decoding and repair.
//!
//! Enrolled templates arrive as base64 text that may carry a data-URL prefix,
//! stray whitespace, broken padding, or a PNG body with bad checksums. This
//! crate turns that text into bytes an image decoder accepts.
//!
//! # Pipeline
//!
//! 1. [`decode_template`]: base64 text -> raw bytes (prefix stripped, re-padded on retry)
//! 2. [`RepairPipeline::repair`]: raw bytes -> decodable PNG bytes
//!
//! ```
//! use fpid_template::{decode_template, has_png_signature};
//!
//! let raw = decode_template("data:image/png;base64,iVBORw0KGgo=").unwrap();
//! assert!(has_png_signature(&raw));
//! ```
//!
//! # Repair strategies
//!
//! Tried in order, first success wins:
//!
//! ```text
//! Direct         standard decoder accepts the bytes as-is
//! Tolerant       checksum-tolerant PNG decode, re-encode as RGB PNG
//! FileRoundTrip  write to a temp file, decode from disk without limits
//! FlagSweep      every DecodeFlags combination, re-encode as RGB PNG
//! ```

mod error;
pub mod repair;
mod signature;
mod decode;

pub use error::{RepairError, TemplateError};
pub use repair::{DecodeFlags, RepairPipeline, Repaired, Strategy};
pub use signature::{PNG_SIGNATURE, detect_corruption, has_png_signature, png_dimensions};
pub use decode::{clean_base64, decode_template, repad, strip_data_url};

#[cfg(test)]
mod tests;
