use vecroute_common::{Result, VecRouteError};

use crate::metric::DistanceMetric;

/// Native vector distance operator (pgvector dialect)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOperator {
    /// `<=>`, returns `1 - cos(a, b)`
    Cosine,
    /// `<->`, returns the L2 distance
    L2,
    /// `<#>`, returns `-dot(a, b)`
    NegativeInnerProduct,
}

impl NativeOperator {
    /// Operator for `metric`; Manhattan has none
    pub fn for_metric(metric: DistanceMetric) -> Result<Self> {
        match metric {
            DistanceMetric::Cosine => Ok(NativeOperator::Cosine),
            DistanceMetric::Euclidean => Ok(NativeOperator::L2),
            DistanceMetric::DotProduct => Ok(NativeOperator::NegativeInnerProduct),
            DistanceMetric::Manhattan => Err(VecRouteError::validation(
                "Metric 'manhattan' has no native SQL operator",
            )),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            NativeOperator::Cosine => "<=>",
            NativeOperator::L2 => "<->",
            NativeOperator::NegativeInnerProduct => "<#>",
        }
    }

    /// Convert the operator's raw output to similarity in `[0, 1]`
    pub fn similarity(&self, native: f64) -> f64 {
        let similarity = match self {
            NativeOperator::Cosine => 1.0 - native,
            NativeOperator::L2 => 1.0 / (1.0 + native.max(0.0)),
            NativeOperator::NegativeInnerProduct => -native,
        };
        if similarity.is_nan() {
            return 0.0;
        }
        similarity.clamp(0.0, 1.0)
    }

    /// Largest raw operator output that can still reach `threshold`
    ///
    /// `None` means every row qualifies and no predicate is needed.
    pub fn distance_bound(&self, threshold: f64) -> Option<f64> {
        if threshold <= 0.0 {
            return None;
        }
        Some(match self {
            NativeOperator::Cosine => 1.0 - threshold,
            NativeOperator::L2 => 1.0 / threshold - 1.0,
            NativeOperator::NegativeInnerProduct => -threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_metric_mapping() {
        assert_eq!(NativeOperator::for_metric(DistanceMetric::Cosine).unwrap().token(), "<=>");
        assert_eq!(NativeOperator::for_metric(DistanceMetric::Euclidean).unwrap().token(), "<->");
        assert_eq!(NativeOperator::for_metric(DistanceMetric::DotProduct).unwrap().token(), "<#>");
        assert!(NativeOperator::for_metric(DistanceMetric::Manhattan)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_similarity_matches_in_process_metric() {
        let a = [0.6f32, 0.8];
        let b = [1.0f32, 0.0];

        let cos = f64::from(a[0] * b[0] + a[1] * b[1]);
        let cosine = NativeOperator::Cosine.similarity(1.0 - cos);
        assert!((cosine - DistanceMetric::Cosine.similarity(&a, &b)).abs() < 1e-6);

        let l2 = DistanceMetric::Euclidean.distance(&a, &b);
        let euclid = NativeOperator::L2.similarity(l2);
        assert!((euclid - DistanceMetric::Euclidean.similarity(&a, &b)).abs() < 1e-6);

        let ip = NativeOperator::NegativeInnerProduct.similarity(-cos);
        assert!((ip - DistanceMetric::DotProduct.similarity(&a, &b)).abs() < 1e-6);
    }

    #[test]
    fn test_bound_inverts_similarity() {
        for op in [
            NativeOperator::Cosine,
            NativeOperator::L2,
            NativeOperator::NegativeInnerProduct,
        ] {
            for threshold in [0.1, 0.5, 0.9] {
                let bound = op.distance_bound(threshold).unwrap();
                assert!((op.similarity(bound) - threshold).abs() < EPS);
            }
            assert!(op.distance_bound(0.0).is_none());
        }
    }
}
