use std::cmp::Ordering;

use crate::features::{Correspondence, DescriptorMatcher};

/// Exact k-nearest-neighbor matcher using L2 distance.
///
/// Compares every query descriptor against every train descriptor.
/// Fine for fingerprint-sized sets (a few hundred descriptors per image).
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl BruteForceMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn knn_match(
        &self,
        query: &[Vec<f32>],
        train: &[Vec<f32>],
        k: usize,
    ) -> Vec<Vec<Correspondence>> {
        query
            .iter()
            .enumerate()
            .map(|(query_idx, q)| {
                if k == 0 {
                    return Vec::new();
                }
                let mut row: Vec<Correspondence> = train
                    .iter()
                    .enumerate()
                    .map(|(train_idx, t)| Correspondence {
                        query_idx,
                        train_idx,
                        distance: l2_distance(q, t),
                    })
                    .collect();
                row.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
                row.truncate(k);
                row
            })
            .collect()
    }
}

/// Euclidean distance between two descriptors.
///
/// Uses f64 accumulation. Returns `f32::INFINITY` on dimension mismatch so
/// mismatched descriptors never win a nearest-neighbor query.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    sum.sqrt() as f32
}
