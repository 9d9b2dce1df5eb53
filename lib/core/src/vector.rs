use serde::{Deserialize, Serialize};

/// A dense embedding vector for a single text term
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn dot(&self, other: &Vector) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Compute cosine similarity with another vector.
    ///
    /// Mismatched dimensions and zero-length vectors score 0.0 so they can
    /// never pass an acceptance threshold.
    #[inline]
    pub fn cosine_similarity(&self, other: &Vector) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }

        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        self.dot(other) / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let v1 = Vector::new(vec![1.0, 0.0]);
        let v2 = Vector::new(vec![1.0, 0.0]);
        assert!((v1.cosine_similarity(&v2) - 1.0).abs() < 1e-6);

        let v3 = Vector::new(vec![1.0, 0.0]);
        let v4 = Vector::new(vec![0.0, 1.0]);
        assert!((v3.cosine_similarity(&v4) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_is_exact_for_integer_norms() {
        // |a| = |b| = 10, dot = 70
        let a = Vector::new(vec![5.0, 5.0, 5.0, 5.0]);
        let b = Vector::new(vec![0.0, 0.0, 6.0, 8.0]);
        assert_eq!(a.cosine_similarity(&b), 0.70);
    }

    #[test]
    fn test_degenerate_vectors_score_zero() {
        let zero = Vector::new(vec![0.0, 0.0]);
        let unit = Vector::new(vec![1.0, 0.0]);
        assert_eq!(zero.cosine_similarity(&unit), 0.0);

        let short = Vector::new(vec![1.0]);
        assert_eq!(short.cosine_similarity(&unit), 0.0);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let v = Vector::new(vec![0.5, -1.0]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[0.5,-1.0]");
    }
}
