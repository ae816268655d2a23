use crate::features::{DescriptorMatcher, FeatureSet};

/// Default ratio-test factor.
pub const DEFAULT_RATIO: f32 = 0.8;

/// Turns two feature sets into a similarity score in `[0, 100]`.
///
/// # Algorithm
///
/// 1. k=2 nearest-neighbor match of every probe descriptor against the
///    candidate descriptors.
/// 2. Ratio test: keep a correspondence only if
///    `nearest < ratio * second_nearest`.
/// 3. `base = good / ((probe_kp + candidate_kp) / 2) * 100`.
/// 4. Multiply by a step bonus on `good`:
///
/// ```text
/// good > 4  -> x1.8
/// good = 4  -> x1.6
/// good = 3  -> x1.4
/// good = 2  -> x1.2
/// otherwise -> x1.0
/// ```
///
/// 5. Clamp to 100.
///
/// Raw fingerprint feature counts are small and noisy, so a handful of
/// strong correspondences carries more weight than its raw share.
#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    ratio: f32,
}

impl Scorer {
    /// Creates a scorer. Stricter (smaller) ratios favor precision,
    /// looser ones favor recall; 0.7 to 0.9 is the useful range.
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Counts correspondences surviving the ratio test.
    ///
    /// Probe descriptors with fewer than two neighbors are discarded.
    pub fn good_matches(
        &self,
        probe: &FeatureSet,
        candidate: &FeatureSet,
        matcher: &dyn DescriptorMatcher,
    ) -> usize {
        matcher
            .knn_match(&probe.descriptors, &candidate.descriptors, 2)
            .iter()
            .filter(|pair| pair.len() >= 2 && pair[0].distance < self.ratio * pair[1].distance)
            .count()
    }

    /// Scores `candidate` against `probe`. Returns 0 when either side has
    /// no descriptors or no keypoints.
    pub fn score(
        &self,
        probe: &FeatureSet,
        candidate: &FeatureSet,
        matcher: &dyn DescriptorMatcher,
    ) -> f32 {
        if probe.is_empty() || candidate.is_empty() || probe.keypoints == 0 || candidate.keypoints == 0 {
            return 0.0;
        }
        let good = self.good_matches(probe, candidate, matcher);
        score_from_counts(good, probe.keypoints, candidate.keypoints)
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_RATIO)
    }
}

/// The scoring formula on raw counts: base share, step bonus, clamp.
pub fn score_from_counts(good: usize, probe_keypoints: usize, candidate_keypoints: usize) -> f32 {
    let avg = (probe_keypoints + candidate_keypoints) as f64 / 2.0;
    if avg == 0.0 {
        return 0.0;
    }
    let base = good as f64 / avg * 100.0;
    (base * bonus(good)).clamp(0.0, 100.0) as f32
}

fn bonus(good: usize) -> f64 {
    match good {
        g if g > 4 => 1.8,
        4 => 1.6,
        3 => 1.4,
        2 => 1.2,
        _ => 1.0,
    }
}
