//! Dense scoring and score fusion.

/// MaxSim: sums, over each query token vector, the maximum dot product
/// against any token vector of the chunk.
///
/// All vectors are unit-normalized, so the dot product is cosine similarity
/// and the score is bounded above by the query token count. The aggregation
/// takes a per-query-token maximum, so it is invariant to the order of the
/// chunk's token vectors. A chunk with no token vectors scores 0.0.
pub fn max_sim(query: &[Vec<f32>], chunk: &[Vec<f32>]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    query
        .iter()
        .map(|q| {
            chunk
                .iter()
                .map(|d| dot(q, d))
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .sum()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Policy for combining the dense and sparse scores into one ranking signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionPolicy {
    /// Unweighted linear sum `dense + sparse` (the base retrieval path).
    Sum,
    /// Convex combination `alpha * dense + (1 - alpha) * sparse`
    /// (the evaluation variant). `alpha` is clamped to [0, 1].
    Weighted {
        /// Weight of the dense score
        alpha: f32,
    },
}

impl FusionPolicy {
    /// Fuses a dense and a sparse score.
    pub fn fuse(&self, dense: f32, sparse: f32) -> f32 {
        match self {
            FusionPolicy::Sum => dense + sparse,
            FusionPolicy::Weighted { alpha } => {
                let alpha = alpha.clamp(0.0, 1.0);
                alpha * dense + (1.0 - alpha) * sparse
            }
        }
    }
}

impl Default for FusionPolicy {
    fn default() -> Self {
        FusionPolicy::Sum
    }
}
