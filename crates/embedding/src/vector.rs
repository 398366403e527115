use serde::{Deserialize, Serialize};

use crate::EmbeddingError;

/// Fixed-length unit-normalized embedding of an image.
///
/// The vector is a value, not an entity: once attached to a sock record it is
/// immutable. Serde serializes it as a plain JSON array of floats, and the
/// `to_le_bytes`/`from_le_bytes` pair gives a raw `f32` little-endian layout
/// for backends that prefer a binary column. Both representations must decode
/// to bit-identical vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Build a unit vector from raw model output, renormalizing to L2 norm 1.
    ///
    /// Returns `Inference` if the raw output has zero norm, since a direction
    /// cannot be recovered from it.
    pub fn unit(mut values: Vec<f32>) -> Result<Self, EmbeddingError> {
        let norm_sq: f32 = values.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 || !norm_sq.is_finite() {
            return Err(EmbeddingError::Inference(
                "raw model output has no usable norm".into(),
            ));
        }
        let inv_norm = norm_sq.sqrt().recip();
        for x in values.iter_mut() {
            *x *= inv_norm;
        }
        Ok(Self(values))
    }

    /// Wrap values that are already known to be unit-normalized (e.g. decoded
    /// from storage, where the upload path already normalized them).
    pub fn from_unit_unchecked(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// L2 norm; 1.0 within floating tolerance for any vector built via `unit`.
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Raw cosine similarity in [-1, 1]. Robust against slightly drifted
    /// norms: divides by both norms rather than assuming exact unit length.
    pub fn cosine(&self, other: &Self) -> f32 {
        let dot: f32 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a * b)
            .sum();
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return 0.0;
        }
        (dot / denom).clamp(-1.0, 1.0)
    }

    /// Serialize as raw little-endian `f32` bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * 4);
        for v in &self.0 {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Reconstruct from raw little-endian `f32` bytes.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, EmbeddingError> {
        if bytes.len() % 4 != 0 {
            return Err(EmbeddingError::Encoding(format!(
                "byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_renormalizes_raw_output() {
        let v = EmbeddingVector::unit(vec![3.0, 4.0]).unwrap();
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((v.as_slice()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn unit_rejects_zero_vector() {
        let err = EmbeddingVector::unit(vec![0.0; 8]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Inference(_)));
    }

    #[test]
    fn self_similarity_is_one() {
        let v = EmbeddingVector::unit(vec![0.2, -0.5, 0.8, 0.1]).unwrap();
        assert!((v.cosine(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = EmbeddingVector::unit(vec![0.3, 0.7, -0.2]).unwrap();
        let b = EmbeddingVector::unit(vec![-0.1, 0.4, 0.9]).unwrap();
        assert!((a.cosine(&b) - b.cosine(&a)).abs() < 1e-6);
    }

    #[test]
    fn le_bytes_roundtrip_is_bit_identical() {
        let v = EmbeddingVector::unit(vec![0.123_456_79, -0.987_654_3, 0.5]).unwrap();
        let decoded = EmbeddingVector::from_le_bytes(&v.to_le_bytes()).unwrap();
        assert_eq!(v, decoded);
    }

    #[test]
    fn json_and_bytes_representations_agree() {
        // The cross-representation invariant: the same vector persisted as a
        // JSON float array and as raw bytes must decode to equal values.
        let v = EmbeddingVector::unit(vec![0.25, 0.5, -0.75, 1.0]).unwrap();
        let json = serde_json::to_string(&v).unwrap();
        let from_json: EmbeddingVector = serde_json::from_str(&json).unwrap();
        let from_bytes = EmbeddingVector::from_le_bytes(&v.to_le_bytes()).unwrap();
        assert_eq!(from_json, from_bytes);
    }

    #[test]
    fn from_le_bytes_rejects_ragged_input() {
        let err = EmbeddingVector::from_le_bytes(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Encoding(_)));
    }
}
