//! 1:N identification over a candidate pool.

use std::fmt;
use std::sync::Arc;

use fpid_template::{RepairPipeline, TemplateError, decode_template};

use crate::cache::FeatureCache;
use crate::config::EngineConfig;
use crate::error::{FeatureError, IdentifyError};
use crate::features::{DescriptorMatcher, FeatureExtractor, FeatureSet, extract_from_bytes};
use crate::record::{EnrollmentRecord, MatchResult, Role};
use crate::scorer::Scorer;

/// Per-request scan counters, for logging and alerting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStats {
    /// Candidates looked at, eligible or not.
    pub processed: usize,
    /// Candidates skipped as flagged, unrepairable or featureless.
    pub corrupted: usize,
    /// Candidates skipped for having no template. Not corruption.
    pub missing: usize,
}

impl ScanStats {
    /// `corrupted / processed`, or 0 for an empty scan.
    pub fn corruption_rate(&self) -> f32 {
        if self.processed == 0 {
            return 0.0;
        }
        self.corrupted as f32 / self.processed as f32
    }

    fn record(&mut self, reason: SkipReason) {
        if reason.is_corruption() {
            self.corrupted += 1;
        } else {
            self.missing += 1;
        }
    }
}

/// Why a candidate was left out of scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No template text.
    Missing,
    /// Flagged corrupted by the record store.
    FlaggedCorrupt,
    /// Template text is not valid base64.
    Template,
    /// Bytes failed the signature check or every repair strategy.
    Repair,
    /// Repaired bytes did not decode.
    Decode,
    /// Decoded image produced no descriptors.
    NoFeatures,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Missing => "missing",
            SkipReason::FlaggedCorrupt => "flagged_corrupt",
            SkipReason::Template => "template",
            SkipReason::Repair => "repair",
            SkipReason::Decode => "decode",
            SkipReason::NoFeatures => "no_features",
        }
    }

    /// Everything except a missing template counts toward the corruption rate.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, SkipReason::Missing)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`Identifier::identify`].
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub result: MatchResult,
    pub stats: ScanStats,
}

impl Identification {
    fn no_match(stats: ScanStats) -> Self {
        Self {
            result: MatchResult::no_match(),
            stats,
        }
    }
}

/// Outcome of [`Identifier::check_duplicate`].
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    /// False if an existing template scored above the duplicate threshold.
    pub unique: bool,
    /// Best-scoring existing template, regardless of threshold.
    pub best: MatchResult,
    pub stats: ScanStats,
}

struct Best<'a> {
    record: &'a EnrollmentRecord,
    score: f32,
}

/// Scores a probe against enrolled candidates and picks the best match.
///
/// Candidates are scanned sequentially in pool order. A candidate replaces
/// the current best only with a strictly greater score, so the earliest of
/// equally scored candidates wins.
///
/// Per-candidate failures never abort the scan: the candidate is skipped and
/// counted in [`ScanStats`]. Only an unusable probe ends a request early.
///
/// The cache is shared: clone the `Arc` into several identifiers (or share
/// one identifier across threads) to reuse extracted features.
pub struct Identifier {
    config: EngineConfig,
    cache: Arc<FeatureCache>,
    extractor: Arc<dyn FeatureExtractor>,
    matcher: Arc<dyn DescriptorMatcher>,
    scorer: Scorer,
    repair: RepairPipeline,
}

impl Identifier {
    /// Creates an identifier with its own cache sized from `config`.
    pub fn new(
        config: EngineConfig,
        extractor: Arc<dyn FeatureExtractor>,
        matcher: Arc<dyn DescriptorMatcher>,
    ) -> Self {
        let cache = Arc::new(FeatureCache::new(config.cache_ttl()));
        Self::with_cache(config, cache, extractor, matcher)
    }

    /// Creates an identifier backed by an existing cache.
    pub fn with_cache(
        config: EngineConfig,
        cache: Arc<FeatureCache>,
        extractor: Arc<dyn FeatureExtractor>,
        matcher: Arc<dyn DescriptorMatcher>,
    ) -> Self {
        let mut repair = RepairPipeline::new();
        if let Some(dir) = &config.temp_dir {
            repair = repair.with_temp_dir(dir);
        }
        Self {
            scorer: Scorer::new(config.ratio_test_factor),
            config,
            cache,
            extractor,
            matcher,
            repair,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<FeatureCache> {
        &self.cache
    }

    /// Identifies `probe` among `pool`, accepting the best candidate only if
    /// its score reaches `threshold`.
    ///
    /// Records carrying a finger slot are cached per finger and the winning
    /// slot is reported, so a multi-finger pool is just one record per
    /// (identity, finger) pair.
    pub fn identify(
        &self,
        probe: &[u8],
        pool: &[EnrollmentRecord],
        threshold: f32,
    ) -> Identification {
        let probe = match self.probe_features(probe) {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!(error = %e, pool = pool.len(), "identify: probe unusable");
                return Identification::no_match(ScanStats::default());
            }
        };

        let (best, stats) = self.scan(&probe, pool.iter());
        let result = match best {
            Some(best) if best.score >= threshold => {
                tracing::info!(
                    id = %best.record.id,
                    role = %best.record.role,
                    finger = ?best.record.finger_type,
                    confidence = best.score,
                    threshold,
                    "identify: match"
                );
                to_match(&best)
            }
            best => {
                tracing::info!(
                    best = best.as_ref().map_or(0.0, |b| b.score),
                    threshold,
                    "identify: no match"
                );
                MatchResult::no_match()
            }
        };
        Identification { result, stats }
    }

    /// [`identify`](Self::identify) with the student acceptance threshold.
    pub fn identify_students(&self, probe: &[u8], pool: &[EnrollmentRecord]) -> Identification {
        self.identify(probe, pool, self.config.threshold_for(Role::Student))
    }

    /// [`identify`](Self::identify) with the staff acceptance threshold.
    pub fn identify_staff(&self, probe: &[u8], pool: &[EnrollmentRecord]) -> Identification {
        self.identify(probe, pool, self.config.threshold_for(Role::Staff))
    }

    /// Scores two raw images against each other. Nothing is cached.
    pub fn verify(&self, a: &[u8], b: &[u8]) -> Result<f32, IdentifyError> {
        let a = extract_from_bytes(a, self.extractor.as_ref())?;
        let b = extract_from_bytes(b, self.extractor.as_ref())?;
        Ok(self.scorer.score(&a, &b, self.matcher.as_ref()))
    }

    /// Checks whether `probe` is already enrolled in `pool` before accepting
    /// a new enrollment.
    ///
    /// Records with id `exclude_id` (the identity being re-enrolled) are
    /// ignored. The probe is a duplicate if some template scores strictly
    /// above the configured duplicate threshold. An unusable probe is an
    /// error here, since uniqueness cannot be established without it.
    pub fn check_duplicate(
        &self,
        probe: &[u8],
        pool: &[EnrollmentRecord],
        exclude_id: Option<&str>,
    ) -> Result<DuplicateCheck, IdentifyError> {
        let probe = self.probe_features(probe)?;
        let candidates = pool
            .iter()
            .filter(|r| exclude_id.is_none_or(|id| r.id != id));
        let (best, stats) = self.scan(&probe, candidates);

        let threshold = self.config.duplicate_threshold;
        let best = best.as_ref().map_or_else(MatchResult::no_match, to_match);
        let unique = best.confidence <= threshold;
        if !unique {
            tracing::warn!(
                id = ?best.id,
                confidence = best.confidence,
                threshold,
                "duplicate: probe matches an enrolled template"
            );
        }
        Ok(DuplicateCheck {
            unique,
            best,
            stats,
        })
    }

    fn probe_features(&self, probe: &[u8]) -> Result<FeatureSet, IdentifyError> {
        extract_from_bytes(probe, self.extractor.as_ref())
            .map_err(|e| IdentifyError::ProbeUnusable(e.to_string()))
    }

    fn scan<'a>(
        &self,
        probe: &FeatureSet,
        pool: impl Iterator<Item = &'a EnrollmentRecord>,
    ) -> (Option<Best<'a>>, ScanStats) {
        let mut stats = ScanStats::default();
        let mut best: Option<Best<'a>> = None;

        for record in pool {
            stats.processed += 1;
            let features = match self.candidate_features(record) {
                Ok(features) => features,
                Err(reason) => {
                    tracing::debug!(id = %record.id, %reason, "identify: candidate skipped");
                    stats.record(reason);
                    continue;
                }
            };

            let score = self.scorer.score(probe, &features, self.matcher.as_ref());
            tracing::trace!(id = %record.id, finger = ?record.finger_type, score, "identify: scored");
            if score > best.as_ref().map_or(0.0, |b| b.score) {
                best = Some(Best { record, score });
            }
        }

        if self.corruption_alert(&stats) {
            tracing::warn!(
                processed = stats.processed,
                corrupted = stats.corrupted,
                rate = stats.corruption_rate(),
                limit = self.config.corruption_alert_rate,
                "identify: high template corruption rate"
            );
        }
        (best, stats)
    }

    /// True when the scan's corruption rate is strictly above the configured
    /// alert rate. Advisory only.
    pub fn corruption_alert(&self, stats: &ScanStats) -> bool {
        stats.corruption_rate() > self.config.corruption_alert_rate
    }

    fn candidate_features(
        &self,
        record: &EnrollmentRecord,
    ) -> Result<Arc<FeatureSet>, SkipReason> {
        let Some(text) = record.template() else {
            return Err(SkipReason::Missing);
        };
        if record.is_corrupted {
            return Err(SkipReason::FlaggedCorrupt);
        }

        let raw = match decode_template(text) {
            Ok(raw) => raw,
            Err(TemplateError::Empty) => return Err(SkipReason::Missing),
            Err(e) => {
                tracing::debug!(id = %record.id, error = %e, "identify: template undecodable");
                return Err(SkipReason::Template);
            }
        };
        let repaired = self.repair.repair(&raw).map_err(|e| {
            tracing::debug!(id = %record.id, error = %e, "identify: repair failed");
            SkipReason::Repair
        })?;

        self.cache
            .get_or_compute(&record.cache_key(), &repaired.bytes, self.extractor.as_ref())
            .map_err(|e| {
                tracing::debug!(id = %record.id, error = %e, "identify: no usable features");
                match e {
                    FeatureError::Decode(_) => SkipReason::Decode,
                    _ => SkipReason::NoFeatures,
                }
            })
    }
}

fn to_match(best: &Best<'_>) -> MatchResult {
    MatchResult {
        id: Some(best.record.id.clone()),
        confidence: best.score,
        finger: best.record.finger_type,
        fingerprint_id: best.record.fingerprint_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use image::DynamicImage;

    use super::*;
    use crate::matcher::BruteForceMatcher;

    struct NoFeatures;

    impl FeatureExtractor for NoFeatures {
        fn extract(&self, _: &DynamicImage) -> Result<FeatureSet, FeatureError> {
            Ok(FeatureSet::default())
        }
    }

    fn identifier(config: EngineConfig) -> Identifier {
        Identifier::new(config, Arc::new(NoFeatures), Arc::new(BruteForceMatcher::new()))
    }

    fn stats(processed: usize, corrupted: usize) -> ScanStats {
        ScanStats {
            processed,
            corrupted,
            missing: 0,
        }
    }

    #[test]
    fn alert_only_above_default_rate() {
        let engine = identifier(EngineConfig::default());
        assert!(!engine.corruption_alert(&stats(10, 2)));
        assert!(engine.corruption_alert(&stats(10, 3)));
        assert!(engine.corruption_alert(&stats(1000, 201)));
        assert!(!engine.corruption_alert(&stats(0, 0)));
    }

    #[test]
    fn alert_honors_configured_rate() {
        let engine = identifier(EngineConfig {
            corruption_alert_rate: 0.5,
            ..Default::default()
        });
        assert!(!engine.corruption_alert(&stats(10, 3)));
        assert!(!engine.corruption_alert(&stats(10, 5)));
        assert!(engine.corruption_alert(&stats(10, 6)));
    }

    #[test]
    fn corruption_rate() {
        assert_eq!(ScanStats::default().corruption_rate(), 0.0);
        let stats = ScanStats {
            processed: 8,
            corrupted: 2,
            missing: 3,
        };
        assert_eq!(stats.corruption_rate(), 0.25);
    }

    #[test]
    fn missing_is_not_corruption() {
        let mut stats = ScanStats::default();
        for reason in [
            SkipReason::Missing,
            SkipReason::FlaggedCorrupt,
            SkipReason::Repair,
            SkipReason::Missing,
        ] {
            stats.record(reason);
        }
        assert_eq!((stats.corrupted, stats.missing), (2, 2));
        assert_eq!(SkipReason::NoFeatures.to_string(), "no_features");
    }
}
