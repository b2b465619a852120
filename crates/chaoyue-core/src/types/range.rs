//! Sorted-set query types.

use serde::{Deserialize, Serialize};

/// Inclusive score interval for sorted-set queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    /// Lowest score included.
    pub min: f64,
    /// Highest score included.
    pub max: f64,
}

impl ScoreRange {
    /// Create a new inclusive range.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// The range covering every score.
    pub fn all() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Whether `score` falls inside the range.
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }

    /// Lower bound as a Redis argument.
    pub fn min_arg(&self) -> String {
        score_arg(self.min)
    }

    /// Upper bound as a Redis argument.
    pub fn max_arg(&self) -> String {
        score_arg(self.max)
    }
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Offset and count applied to a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    /// Number of matching members to skip.
    pub offset: u64,
    /// Maximum number of members to return.
    pub count: u64,
}

impl Limit {
    /// Create a new limit.
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }
}

fn score_arg(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}
