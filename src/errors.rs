use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single (review, strategy) call did not produce a usable rating.
///
/// These are counted outcomes, never fatal: the evaluator records them on the
/// prediction and moves on to the next review.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PredictionError {
    #[error("response is not a well-formed rating record: {0}")]
    Parse(String),
    #[error("rating {0} is outside the 1-5 range")]
    OutOfRange(i64),
    #[error("text generation failed: {0}")]
    Call(String),
    #[error("no response within {0} seconds")]
    Timeout(u64),
}

/// Errors raised by a text generation provider.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Environment variable {0} not found")]
    MissingApiKey(String),
    #[error("Failed to build request: {0}")]
    RequestBuild(String),
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Request to provider failed: {0}")]
    Request(String),
    #[error("Provider returned an error: {0}")]
    Api(String),
    #[error("Failed to decode provider response: {0}")]
    Deserialization(reqwest::Error),
}

/// Invalid input to the feedback responder.
#[derive(Error, Debug, PartialEq)]
pub enum FeedbackError {
    #[error("Please write a review")]
    EmptyReview,
    #[error("Review too long (max {max} characters, got {actual})")]
    ReviewTooLong { max: usize, actual: usize },
}
