//! 1:N fingerprint identification.
//!
//! # Architecture
//!
//! One request flows one way:
//!
//! ```text
//! template text -> raw bytes -> repaired PNG -> FeatureSet (cached) -> score -> MatchResult
//! ```
//!
//! 1. [`fpid_template`] decodes and repairs each candidate's template.
//! 2. [`FeatureCache::get_or_compute`] memoizes extraction per
//!    (role, identity, finger) key with a coarse whole-cache TTL.
//! 3. [`Scorer::score`] runs a k=2 match, the ratio test and a step bonus,
//!    clamped to `[0, 100]`.
//! 4. [`Identifier::identify`] keeps the strictly best score in pool order and
//!    applies the acceptance threshold.
//!
//! Keypoint detection and nearest-neighbor matching are supplied through the
//! [`FeatureExtractor`] and [`DescriptorMatcher`] traits. [`BruteForceMatcher`]
//! is an exact matcher suitable for small pools and tests.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fpid_identify::{BruteForceMatcher, EngineConfig, Identifier};
//!
//! let engine = Identifier::new(
//!     EngineConfig::load("engine.yaml")?,
//!     Arc::new(MySiftExtractor::new()),
//!     Arc::new(BruteForceMatcher::new()),
//! );
//! let found = engine.identify_students(&probe_png, &records);
//! if let Some(id) = &found.result.id {
//!     println!("{id}: {:.2}", found.result.confidence);
//! }
//! ```

mod cache;
mod config;
mod error;
mod features;
mod identifier;
mod matcher;
mod record;
mod scorer;

pub use cache::{CacheStats, DEFAULT_TTL, FeatureCache};
pub use config::EngineConfig;
pub use error::{ConfigError, FeatureError, IdentifyError};
pub use features::{Correspondence, DescriptorMatcher, FeatureExtractor, FeatureSet, extract_from_bytes};
pub use identifier::{DuplicateCheck, Identification, Identifier, ScanStats, SkipReason};
pub use matcher::{BruteForceMatcher, l2_distance};
pub use record::{CacheKey, EnrollmentRecord, FingerSlot, MatchResult, Role};
pub use scorer::{DEFAULT_RATIO, Scorer, score_from_counts};
