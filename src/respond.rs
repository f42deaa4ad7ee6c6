//! Replies to customer feedback: a message for the customer, a one-line
//! summary for the manager, and a few improvement suggestions.
//!
//! The model is asked for a fixed line-oriented layout. When it cannot be
//! reached, or its answer is missing a part, a canned reply for the star
//! rating is used instead.

use crate::client::TextGenerator;
use crate::errors::FeedbackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub const MAX_REVIEW_CHARS: usize = 1000;

const RESPONSE_LABEL: &str = "RESPONSE TO CUSTOMER:";
const SUMMARY_LABEL: &str = "SUMMARY:";
const SUGGESTIONS_LABEL: &str = "SUGGESTIONS:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Model,
    Fallback,
}

impl fmt::Display for ReplySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplySource::Model => f.write_str("model"),
            ReplySource::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReply {
    pub customer_response: String,
    pub summary: String,
    pub suggestions: Vec<String>,
    pub source: ReplySource,
}

/// Trim the review and check its length
pub fn validate_review(review: &str) -> Result<&str, FeedbackError> {
    let review = review.trim();
    if review.is_empty() {
        return Err(FeedbackError::EmptyReview);
    }
    let chars = review.chars().count();
    if chars > MAX_REVIEW_CHARS {
        return Err(FeedbackError::ReviewTooLong {
            max: MAX_REVIEW_CHARS,
            actual: chars,
        });
    }
    Ok(review)
}

pub fn build_reply_prompt(rating: u8, review: &str) -> String {
    format!(
        "As a restaurant feedback system, generate responses for this {rating}-star review:\n\n\
         REVIEW: \"{review}\"\n\n\
         Generate:\n\
         1. A polite, professional response to the customer (1-2 sentences)\n\
         2. A brief summary for the restaurant manager (1 sentence)\n\
         3. 2-3 actionable suggestions for improvement\n\n\
         Format your response as:\n\
         {RESPONSE_LABEL} [your response here]\n\
         {SUMMARY_LABEL} [your summary here]\n\
         {SUGGESTIONS_LABEL} [suggestion 1], [suggestion 2], [suggestion 3]"
    )
}

/// Parse the labelled layout; `None` unless all three parts are present
pub fn parse_reply(text: &str) -> Option<FeedbackReply> {
    let mut customer_response = None;
    let mut summary = None;
    let mut suggestions = Vec::new();

    for line in text.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix(RESPONSE_LABEL) {
            customer_response = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(SUMMARY_LABEL) {
            summary = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(SUGGESTIONS_LABEL) {
            suggestions = rest
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    let customer_response = customer_response.filter(|s| !s.is_empty())?;
    let summary = summary.filter(|s| !s.is_empty())?;
    if suggestions.is_empty() {
        return None;
    }

    Some(FeedbackReply {
        customer_response,
        summary,
        suggestions,
        source: ReplySource::Model,
    })
}

/// Canned reply for a star rating; ratings outside 1-5 get the 3-star reply
pub fn fallback_reply(rating: u8) -> FeedbackReply {
    let (customer_response, summary, suggestions): (&str, &str, [&str; 3]) = match rating {
        1 => (
            "We sincerely apologize for your disappointing experience. We take your feedback seriously and will address these issues immediately.",
            "Critical 1-star review requiring urgent attention.",
            ["Immediate customer follow-up", "Staff retraining", "Quality control review"],
        ),
        2 => (
            "Thank you for your honest feedback. We're sorry we fell short of your expectations and will work to improve.",
            "Dissatisfied customer with specific complaints.",
            ["Review service protocols", "Check product quality", "Consider compensation"],
        ),
        4 => (
            "Thank you for your positive review! We're delighted you enjoyed your experience and hope to see you again soon!",
            "Positive review with high satisfaction.",
            ["Share with team for motivation", "Reinforce positive practices", "Thank the staff involved"],
        ),
        5 => (
            "Wow! Thank you for the amazing review! We're thrilled you loved everything and can't wait to welcome you back!",
            "Excellent review with high praise.",
            ["Feature as testimonial", "Reward exceptional staff", "Share on social media"],
        ),
        _ => (
            "Thank you for your feedback. We appreciate you taking the time to share your experience with us.",
            "Average experience with room for improvement.",
            ["Identify improvement areas", "Monitor similar feedback", "Standard check"],
        ),
    };

    FeedbackReply {
        customer_response: customer_response.to_string(),
        summary: summary.to_string(),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        source: ReplySource::Fallback,
    }
}

/// Ask the model for a reply, falling back to the canned one.
///
/// Only invalid input is an error; a missing generator or a provider failure
/// is logged and answered from the fallback table.
pub async fn generate_reply(
    generator: Option<&dyn TextGenerator>,
    rating: u8,
    review: &str,
) -> Result<FeedbackReply, FeedbackError> {
    let review = validate_review(review)?;
    let Some(generator) = generator else {
        return Ok(fallback_reply(rating));
    };
    let prompt = build_reply_prompt(rating, review);

    match generator.generate(&prompt).await {
        Ok(text) => match parse_reply(&text) {
            Some(reply) => {
                debug!(rating, "model reply parsed");
                Ok(reply)
            }
            None => {
                warn!(rating, "model reply did not follow the requested layout, using fallback");
                Ok(fallback_reply(rating))
            }
        },
        Err(e) => {
            warn!(rating, error = %e, "text generation failed, using fallback");
            Ok(fallback_reply(rating))
        }
    }
}
