use image::DynamicImage;

use crate::error::FeatureError;

/// Keypoint count plus descriptor vectors extracted from one image.
///
/// Never mutated after creation; shared between requests as `Arc<FeatureSet>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureSet {
    /// Number of detected keypoints. Usually equals `descriptors.len()`,
    /// but extractors may report keypoints they could not describe.
    pub keypoints: usize,

    /// One descriptor vector per described keypoint.
    pub descriptors: Vec<Vec<f32>>,
}

impl FeatureSet {
    /// Creates a set whose keypoint count equals the descriptor count.
    pub fn from_descriptors(descriptors: Vec<Vec<f32>>) -> Self {
        Self {
            keypoints: descriptors.len(),
            descriptors,
        }
    }

    /// True if no descriptor was produced.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Detects keypoints and computes descriptors for an image.
///
/// This is the vision capability the engine is built around (e.g. SIFT).
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image: &DynamicImage) -> Result<FeatureSet, FeatureError>;
}

/// One candidate correspondence from a k-nearest-neighbor query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the query descriptors.
    pub query_idx: usize,

    /// Index into the train descriptors.
    pub train_idx: usize,

    /// Lower values mean more similar.
    pub distance: f32,
}

/// Finds, for every query descriptor, its `k` closest train descriptors.
///
/// Each inner vector is ordered by ascending distance and holds at most `k`
/// entries (fewer when `train` is smaller than `k`).
pub trait DescriptorMatcher: Send + Sync {
    fn knn_match(
        &self,
        query: &[Vec<f32>],
        train: &[Vec<f32>],
        k: usize,
    ) -> Vec<Vec<Correspondence>>;
}

/// Decodes raw image bytes and runs `extractor` on the result.
///
/// An image yielding zero descriptors is reported as
/// [`FeatureError::NoDescriptors`].
pub fn extract_from_bytes(
    bytes: &[u8],
    extractor: &dyn FeatureExtractor,
) -> Result<FeatureSet, FeatureError> {
    let image = image::load_from_memory(bytes)?;
    let features = extractor.extract(&image)?;
    if features.is_empty() {
        return Err(FeatureError::NoDescriptors);
    }
    Ok(features)
}
