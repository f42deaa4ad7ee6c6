use crate::errors::PredictionError;
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};

/// A review with its known star rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub text: String,
    /// Ground truth, always in 1..=5
    pub true_rating: u8,
}

/// Result of parsing one model answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatingOutcome {
    Valid {
        rating: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Invalid {
        reason: PredictionError,
    },
}

/// One strategy's prediction for one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub review_id: String,
    pub strategy: Strategy,
    pub true_rating: u8,
    /// Model output exactly as received, empty when the call itself failed
    pub raw_response: String,
    pub outcome: RatingOutcome,
}

impl Prediction {
    pub fn predicted_rating(&self) -> Option<u8> {
        match self.outcome {
            RatingOutcome::Valid { rating, .. } => Some(rating),
            RatingOutcome::Invalid { .. } => None,
        }
    }

    pub fn is_valid_json(&self) -> bool {
        matches!(self.outcome, RatingOutcome::Valid { .. })
    }

    pub fn error(&self) -> Option<&PredictionError> {
        match &self.outcome {
            RatingOutcome::Valid { .. } => None,
            RatingOutcome::Invalid { reason } => Some(reason),
        }
    }
}

/// Repeated invocations of a (review, strategy) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyTrial {
    pub review_id: String,
    pub strategy: Strategy,
    /// Rating from the main evaluation pass
    pub first_rating: Option<u8>,
    pub repeat_ratings: Vec<Option<u8>>,
}

impl ConsistencyTrial {
    /// Repeats that produced the same valid rating as the first run
    pub fn agreeing_repeats(&self) -> usize {
        match self.first_rating {
            Some(first) => self
                .repeat_ratings
                .iter()
                .filter(|r| **r == Some(first))
                .count(),
            None => 0,
        }
    }
}

/// Aggregate scores for a single strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub strategy: Strategy,
    /// Predictions made
    pub total: usize,
    /// Predictions that parsed into a rating
    pub valid: usize,
    /// Exact matches over valid predictions, `None` without valid predictions
    pub accuracy: Option<f64>,
    /// Predictions at most one star off, over valid predictions
    pub within_one_accuracy: Option<f64>,
    pub mae: Option<f64>,
    pub json_validity_rate: f64,
    /// Agreement across repeated calls, `None` when nothing was repeated
    pub consistency_score: Option<f64>,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: Vec<StrategyMetrics>,
    pub predictions: Vec<Prediction>,
    pub consistency: Vec<ConsistencyTrial>,
}
