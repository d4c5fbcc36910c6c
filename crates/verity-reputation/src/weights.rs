//! Normalized reward-weight vectors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use verity_consensus::WorkerId;

/// Tolerance within which a vector is considered to sum to 1.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// Map of worker id to weight.
///
/// A normalized vector holds only positive, finite weights summing to 1,
/// or is empty. Iteration is in worker id order, so sums are
/// reproducible bit for bit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<WorkerId, f64>);

impl WeightVector {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the weight of a worker, if present.
    pub fn get(&self, worker: WorkerId) -> Option<f64> {
        self.0.get(&worker).copied()
    }

    /// Sets a worker's raw weight.
    pub fn insert(&mut self, worker: WorkerId, weight: f64) {
        self.0.insert(worker, weight);
    }

    /// Number of workers in the vector.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the vector has no workers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// Returns true if the vector sums to 1 within [`SUM_TOLERANCE`].
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= SUM_TOLERANCE
    }

    /// Iterates `(worker, weight)` pairs in worker order.
    pub fn iter(&self) -> impl Iterator<Item = (WorkerId, f64)> + '_ {
        self.0.iter().map(|(&w, &v)| (w, v))
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &BTreeMap<WorkerId, f64> {
        &self.0
    }

    /// Returns a copy scaled to sum to 1.
    ///
    /// Entries that are zero, negative or not finite are dropped. If
    /// nothing positive remains the result is empty.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let positive: BTreeMap<WorkerId, f64> = self
            .0
            .iter()
            .filter(|&(_, &w)| w.is_finite() && w > 0.0)
            .map(|(&k, &w)| (k, w))
            .collect();

        let total: f64 = positive.values().sum();
        if total <= 0.0 || !total.is_finite() {
            return Self::new();
        }

        Self(positive.into_iter().map(|(k, w)| (k, w / total)).collect())
    }
}

impl From<BTreeMap<WorkerId, f64>> for WeightVector {
    fn from(map: BTreeMap<WorkerId, f64>) -> Self {
        Self(map)
    }
}

impl FromIterator<(WorkerId, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (WorkerId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(entries: &[(u32, f64)]) -> WeightVector {
        entries.iter().map(|&(w, v)| (WorkerId(w), v)).collect()
    }

    #[test]
    fn test_normalize_scales_to_one() {
        let v = vector(&[(1, 2.0), (2, 6.0)]).normalized();
        assert_eq!(v.get(WorkerId(1)), Some(0.25));
        assert_eq!(v.get(WorkerId(2)), Some(0.75));
        assert!(v.is_normalized());
    }

    #[test]
    fn test_normalize_drops_non_positive() {
        let v = vector(&[(1, 0.0), (2, -1.0), (3, f64::NAN), (4, 5.0)]).normalized();
        assert_eq!(v.len(), 1);
        assert_eq!(v.get(WorkerId(4)), Some(1.0));
    }

    #[test]
    fn test_normalize_all_zero_is_empty() {
        let v = vector(&[(1, 0.0), (2, 0.0)]).normalized();
        assert!(v.is_empty());
        assert_eq!(v.sum(), 0.0);
    }

    #[test]
    fn test_empty_stays_empty() {
        assert!(WeightVector::new().normalized().is_empty());
    }

    #[test]
    fn test_serializes_as_map() {
        let v = vector(&[(7, 1.0)]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"7":1.0}"#);
    }
}
