//! Distance and similarity functions
//!
//! Euclidean and Manhattan are distance-first: `similarity = 1 / (1 + distance)`.
//! Cosine and dot product are similarity-first: the raw similarity is clamped
//! to `[0, 1]` and `distance = 1 - similarity`. Only the distance-first pair
//! are true metrics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vecroute_common::VecRouteError;

/// Distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    DotProduct,
    Manhattan,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 4] = [
        DistanceMetric::Cosine,
        DistanceMetric::Euclidean,
        DistanceMetric::DotProduct,
        DistanceMetric::Manhattan,
    ];

    /// Distance between two equal-length vectors
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::Euclidean => euclidean(a, b),
            DistanceMetric::Manhattan => manhattan(a, b),
            DistanceMetric::Cosine | DistanceMetric::DotProduct => 1.0 - self.similarity(a, b),
        }
    }

    /// Similarity in `[0, 1]` between two equal-length vectors
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::Cosine => clamp_unit(cosine(a, b)),
            DistanceMetric::DotProduct => clamp_unit(dot(a, b)),
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => {
                self.similarity_from_distance(self.distance(a, b))
            }
        }
    }

    /// `(similarity, distance)` in one pass
    pub fn score(&self, a: &[f32], b: &[f32]) -> (f64, f64) {
        match self {
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => {
                let distance = self.distance(a, b);
                (self.similarity_from_distance(distance), distance)
            }
            DistanceMetric::Cosine | DistanceMetric::DotProduct => {
                let similarity = self.similarity(a, b);
                (similarity, 1.0 - similarity)
            }
        }
    }

    /// Map a distance under this metric back to similarity
    pub fn similarity_from_distance(&self, distance: f64) -> f64 {
        match self {
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => {
                if distance.is_nan() {
                    0.0
                } else {
                    1.0 / (1.0 + distance.max(0.0))
                }
            }
            DistanceMetric::Cosine | DistanceMetric::DotProduct => clamp_unit(1.0 - distance),
        }
    }

    /// Whether the triangle inequality holds
    pub fn is_true_metric(&self) -> bool {
        matches!(self, DistanceMetric::Euclidean | DistanceMetric::Manhattan)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Manhattan => "manhattan",
        }
    }
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Cosine
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = VecRouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot" | "dot_product" | "inner_product" => Ok(DistanceMetric::DotProduct),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            other => Err(VecRouteError::validation(format!(
                "Unknown distance metric '{}'",
                other
            ))),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    // Two zero vectors are identical; a zero vector shares no direction with anything else
    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => dot / (norm_a.sqrt() * norm_b.sqrt()),
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

fn manhattan(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_cosine_known_values() {
        let m = DistanceMetric::Cosine;
        assert!((m.similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < EPS);
        assert!(m.similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < EPS);
        // opposite vectors clamp to zero similarity
        assert!(m.similarity(&[1.0, 0.0], &[-1.0, 0.0]).abs() < EPS);
        assert!((m.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 1.0).abs() < EPS);

        let expected = 32.0 / (14.0f64.sqrt() * 77.0f64.sqrt());
        assert!((m.similarity(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]) - expected).abs() < EPS);
    }

    #[test]
    fn test_cosine_scaling_invariance() {
        let m = DistanceMetric::Cosine;
        let s1 = m.similarity(&[1.0, 2.0], &[3.0, 4.0]);
        let s2 = m.similarity(&[2.0, 4.0], &[6.0, 8.0]);
        assert!((s1 - s2).abs() < EPS);
    }

    #[test]
    fn test_cosine_zero_vectors() {
        let m = DistanceMetric::Cosine;
        assert!((m.similarity(&[0.0, 0.0], &[0.0, 0.0]) - 1.0).abs() < EPS);
        assert!(m.similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < EPS);
    }

    #[test]
    fn test_euclidean_known_values() {
        let m = DistanceMetric::Euclidean;
        assert!((m.distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < EPS);
        assert!((m.similarity(&[0.0, 0.0], &[3.0, 4.0]) - 1.0 / 6.0).abs() < EPS);
    }

    #[test]
    fn test_manhattan_known_values() {
        let m = DistanceMetric::Manhattan;
        assert!((m.distance(&[1.0, -1.0], &[4.0, 3.0]) - 7.0).abs() < EPS);
        assert!((m.similarity(&[1.0, -1.0], &[4.0, 3.0]) - 0.125).abs() < EPS);
    }

    #[test]
    fn test_dot_product_normalized() {
        let m = DistanceMetric::DotProduct;
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((m.similarity(&[1.0, 0.0], &[h, h]) - f64::from(h)).abs() < EPS);
        assert!((m.distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < EPS);
    }

    #[test]
    fn test_score_matches_parts() {
        let a = [0.3, -0.2, 0.9];
        let b = [0.1, 0.4, 0.5];
        for metric in DistanceMetric::ALL {
            let (similarity, distance) = metric.score(&a, &b);
            assert!((similarity - metric.similarity(&a, &b)).abs() < EPS);
            assert!((distance - metric.distance(&a, &b)).abs() < EPS);
            assert!((metric.similarity_from_distance(distance) - similarity).abs() < EPS);
        }
    }

    #[test]
    fn test_nan_component_scores_zero() {
        let a = [1.0, f32::NAN];
        let b = [1.0, 0.0];
        for metric in DistanceMetric::ALL {
            assert_eq!(metric.similarity(&a, &b), 0.0, "{}", metric);
            assert_eq!(metric.score(&a, &b).0, 0.0, "{}", metric);
        }
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("L2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("dot-product".parse::<DistanceMetric>().unwrap(), DistanceMetric::DotProduct);
        assert_eq!("l1".parse::<DistanceMetric>().unwrap(), DistanceMetric::Manhattan);
        assert!("hamming".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_metric_serde_snake_case() {
        let json = serde_json::to_string(&DistanceMetric::DotProduct).unwrap();
        assert_eq!(json, "\"dot_product\"");
        for metric in DistanceMetric::ALL {
            let parsed: DistanceMetric = metric.as_str().parse().unwrap();
            assert_eq!(parsed, metric);
        }
    }
}
