//! Client-side retrieval strategies.
//!
//! Qdrant answers plain similarity and score-threshold queries directly.
//! Maximal marginal relevance needs the candidate vectors back on the
//! client, so the gateway over-fetches `fetch_k` points with vectors and
//! this module picks the final `k`.

use advisor_core::types::ScoredChunk;

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Maximal marginal relevance over a candidate pool.
///
/// Greedily selects up to `k` chunks, balancing relevance to the query
/// against redundancy with the already-selected set. `lambda` = 1.0 is
/// pure relevance, 0.0 is pure diversity.
pub fn mmr(
    query: &[f32],
    candidates: Vec<(Vec<f32>, ScoredChunk)>,
    lambda: f32,
    k: usize,
) -> Vec<ScoredChunk> {
    let mut pool: Vec<(Vec<f32>, ScoredChunk, f32)> = candidates
        .into_iter()
        .map(|(v, c)| {
            let relevance = cosine_similarity(query, &v);
            (v, c, relevance)
        })
        .collect();

    let mut selected: Vec<(Vec<f32>, ScoredChunk)> = Vec::new();
    while selected.len() < k && !pool.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (i, (vector, _, relevance)) in pool.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|(sv, _)| cosine_similarity(vector, sv))
                .fold(f32::NEG_INFINITY, f32::max);
            let score = if selected.is_empty() {
                *relevance
            } else {
                lambda * relevance - (1.0 - lambda) * redundancy
            };
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }
        let (vector, chunk, _) = pool.swap_remove(best_idx);
        selected.push((vector, chunk));
    }

    selected.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::types::Metadata;

    fn chunk(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            text: text.to_string(),
            metadata: Metadata::new(),
            score,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_mmr_picks_most_relevant_first() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            (vec![0.0, 1.0], chunk("orthogonal", 0.1)),
            (vec![1.0, 0.0], chunk("aligned", 0.9)),
        ];
        let picked = mmr(&query, candidates, 0.5, 1);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].text, "aligned");
    }

    #[test]
    fn test_mmr_prefers_diversity_over_near_duplicate() {
        let query = vec![1.0, 0.0];
        // Two near-identical highly relevant vectors and one distinct,
        // somewhat relevant one. With lambda 0.5 the duplicate loses.
        let candidates = vec![
            (vec![1.0, 0.0], chunk("first", 0.99)),
            (vec![0.999, 0.01], chunk("duplicate", 0.98)),
            (vec![0.5, 0.5], chunk("different", 0.7)),
        ];
        let picked = mmr(&query, candidates, 0.5, 2);
        assert_eq!(picked[0].text, "first");
        assert_eq!(picked[1].text, "different");
    }

    #[test]
    fn test_mmr_caps_at_pool_size() {
        let query = vec![1.0, 0.0];
        let candidates = vec![(vec![1.0, 0.0], chunk("only", 0.9))];
        assert_eq!(mmr(&query, candidates, 0.5, 5).len(), 1);
    }
}
