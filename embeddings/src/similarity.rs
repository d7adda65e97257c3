//! Similarity computation and ranking for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Fails when the dimensions differ or when either vector has zero
/// magnitude, instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Err(EmbeddingError::ZeroMagnitude);
    }

    Ok((dot / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0))
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Whether `v` can take part in a cosine comparison: finite, non-zero.
pub fn is_comparable(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite()) && v.iter().any(|x| *x != 0.0)
}

/// Rank `entries` against `query` by descending cosine similarity.
///
/// Entries with equal scores keep their input order. With `top_k` set, at
/// most that many entries are returned. Every entry must have the query's
/// dimension.
pub fn rank<T, V>(
    query: &[f32],
    entries: impl IntoIterator<Item = (T, V)>,
    top_k: Option<usize>,
) -> Result<Vec<(T, f32)>>
where
    V: AsRef<[f32]>,
{
    let mut scored: Vec<(OrderedFloat<f32>, T)> = Vec::new();
    for (item, embedding) in entries {
        let score = cosine_similarity(query, embedding.as_ref())?;
        scored.push((OrderedFloat(score), item));
    }

    // Stable sort: ties keep input order.
    scored.sort_by_key(|(score, _)| Reverse(*score));

    let limit = top_k.unwrap_or(scored.len());
    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(score, item)| (item, score.0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetric_and_bounded() {
        let pairs = [
            (vec![0.3, -1.2, 4.0], vec![2.0, 0.5, -0.1]),
            (vec![1e-3, 1e-3], vec![1e3, 1e3]),
            (vec![-5.0, 2.0, 0.0, 1.0], vec![0.1, 0.2, 0.3, 0.4]),
        ];
        for (a, b) in pairs {
            let ab = cosine_similarity(&a, &b).unwrap();
            let ba = cosine_similarity(&b, &a).unwrap();
            assert_eq!(ab, ba);
            assert!((-1.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn test_zero_magnitude_is_an_error() {
        assert!(matches!(
            cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]),
            Err(EmbeddingError::ZeroMagnitude)
        ));
        assert!(matches!(
            cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]),
            Err(EmbeddingError::ZeroMagnitude)
        ));
    }

    #[test]
    fn test_is_comparable() {
        assert!(is_comparable(&[0.0, 0.5]));
        assert!(!is_comparable(&[0.0, 0.0]));
        assert!(!is_comparable(&[]));
        assert!(!is_comparable(&[1.0, f32::NAN]));
        assert!(!is_comparable(&[f32::INFINITY, 0.0]));
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(matches!(
            cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_rank_top_k() {
        let entries = vec![
            ("x", vec![1.0, 0.0]),
            ("y", vec![0.0, 1.0]),
            ("z", vec![0.7, 0.7]),
        ];

        let ranked = rank(&[1.0, 0.0], entries, Some(2)).unwrap();
        let ids: Vec<_> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["x", "z"]);
        assert!((ranked[0].1 - 1.0).abs() < 1e-6);
        assert!((ranked[1].1 - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_rank_without_limit_is_full_permutation() {
        let entries = vec![
            ("a", vec![0.0, 1.0]),
            ("b", vec![1.0, 1.0]),
            ("c", vec![1.0, 0.0]),
            ("d", vec![-1.0, 0.0]),
        ];

        let all = rank(&[1.0, 0.0], entries.clone(), None).unwrap();
        let ids: Vec<_> = all.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["c", "b", "a", "d"]);
        assert!(all.windows(2).all(|w| w[0].1 >= w[1].1));

        let top = rank(&[1.0, 0.0], entries, Some(3)).unwrap();
        assert_eq!(top, all[..3].to_vec());
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let entries = vec![
            ("first", vec![0.0, 2.0]),
            ("second", vec![0.0, 1.0]),
            ("third", vec![0.0, 5.0]),
        ];

        let ranked = rank(&[0.0, 1.0], entries, None).unwrap();
        let ids: Vec<_> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rank_top_k_larger_than_entries() {
        let ranked = rank(&[1.0], vec![("only", vec![2.0])], Some(10)).unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_rank_rejects_mixed_dimensions() {
        let entries = vec![("ok", vec![1.0, 0.0]), ("bad", vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            rank(&[1.0, 0.0], entries, None),
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
    }
}
