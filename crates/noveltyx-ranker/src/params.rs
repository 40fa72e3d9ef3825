//! Tunable constants of the novelty model.

use serde::{Deserialize, Serialize};

/// Saturation parameters of the recency signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecencyParams {
    /// Count scale; the count factor is 0.5 at half of it
    pub max_count: f64,
    /// Oldest-publication age scale in years
    pub max_age: f64,
    /// Steepness of the count factor
    pub count_steepness: f64,
    /// Steepness of the age factor
    pub age_steepness: f64,
}

impl Default for RecencyParams {
    fn default() -> Self {
        Self {
            max_count:       100.0,
            max_age:         50.0,
            count_steepness: 10.0,
            age_steepness:   4.0,
        }
    }
}

/// Constants of the novelty combination formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoveltyParams {
    pub recency: RecencyParams,
    /// Inverse similarity above which the score is amplified
    pub dissimilarity_threshold: f64,
    /// Added to the inverse similarity to form the amplification factor
    pub amplification_offset: f64,
    /// Multiplier applied to FDA-approved drugs
    pub approved_penalty: f64,
    /// Upper bound before the FDA penalty
    pub max_score: f64,
}

impl Default for NoveltyParams {
    fn default() -> Self {
        Self {
            recency:                 RecencyParams::default(),
            dissimilarity_threshold: 0.5,
            amplification_offset:    0.73,
            approved_penalty:        0.85,
            max_score:               1.0,
        }
    }
}

impl NoveltyParams {
    /// Check that every constant keeps the score in [0, 1].
    pub fn validate(&self) -> bool {
        let r = &self.recency;
        r.max_count > 0.0
            && r.max_age > 0.0
            && (0.0..=1.0).contains(&self.dissimilarity_threshold)
            && self.amplification_offset >= 0.0
            && (0.0..=1.0).contains(&self.approved_penalty)
            && (0.0..=1.0).contains(&self.max_score)
    }
}
