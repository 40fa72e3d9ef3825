//! Novelty combination of FDA status, recency and similarity.
//!
//! ```text
//! recency defined:
//!     score = recency
//!     similarity defined:
//!         inv = 1 − similarity
//!         inv > threshold  → score *= offset + inv
//!         score = min(score, max)
//!         FDA approved     → score *= penalty
//! otherwise:
//!     score = 1 − similarity, or 0 when similarity is undefined
//! ```

use crate::evidence::FdaStatus;
use crate::params::NoveltyParams;

pub fn novelty_score(
    fda: Option<FdaStatus>,
    recency: Option<f64>,
    similarity: Option<f64>,
    params: &NoveltyParams,
) -> f64 {
    let Some(recency) = recency else {
        return similarity.map_or(0.0, |s| 1.0 - s);
    };

    let mut score = recency;
    if let Some(similarity) = similarity {
        let inverse = 1.0 - similarity;
        if inverse > params.dissimilarity_threshold {
            score *= params.amplification_offset + inverse;
        }
        score = score.min(params.max_score);
        if fda == Some(FdaStatus::Approved) {
            score *= params.approved_penalty;
        }
    }
    score
}
