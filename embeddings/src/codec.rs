//! Binary encoding of embedding vectors for storage.
//!
//! Vectors are stored as a flat sequence of little-endian `f32` values, so a
//! vector of dimension `n` always occupies `4 * n` bytes.

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

const WIDTH: usize = std::mem::size_of::<f32>();

/// Encode an embedding into bytes.
pub fn encode(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * WIDTH);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Embedding> {
    if bytes.len() % WIDTH != 0 {
        return Err(EmbeddingError::InvalidEncoding(format!(
            "{} bytes is not a multiple of {WIDTH}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_preserves_bits() {
        let v = vec![0.0, -0.0, 1.5, -3.25, f32::MIN_POSITIVE, f32::MAX, 1e-30];
        let decoded = decode(&encode(&v)).unwrap();
        let bits = |xs: &[f32]| xs.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&decoded), bits(&v));
    }

    #[test]
    fn test_encoded_length() {
        assert_eq!(encode(&[1.0, 2.0, 3.0]).len(), 12);
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_truncated_bytes() {
        let mut bytes = encode(&[1.0, 2.0]);
        bytes.pop();
        assert!(matches!(
            decode(&bytes),
            Err(EmbeddingError::InvalidEncoding(_))
        ));
    }
}
