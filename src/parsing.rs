use crate::errors::PredictionError;
use crate::models::RatingOutcome;
use serde_json::Value;

/// Fields that may carry the rating, checked in order
const RATING_FIELDS: [&str; 3] = ["predicted_stars", "rating", "stars"];
const EXPLANATION_FIELDS: [&str; 2] = ["explanation", "reason"];

/// Parse a model answer into a rating outcome.
///
/// Never fails: malformed answers become `RatingOutcome::Invalid`.
pub fn parse_rating_response(response: &str) -> RatingOutcome {
    match extract_rating(response) {
        Ok((rating, explanation)) => RatingOutcome::Valid { rating, explanation },
        Err(reason) => RatingOutcome::Invalid { reason },
    }
}

fn extract_rating(response: &str) -> Result<(u8, Option<String>), PredictionError> {
    let parsed = parse_json_response(strip_code_fence(response))?;

    let (value, explanation) = match &parsed {
        Value::Object(fields) => {
            let value = RATING_FIELDS
                .iter()
                .find_map(|name| fields.get(*name))
                .ok_or_else(|| PredictionError::Parse("no rating field".to_string()))?;
            let explanation = EXPLANATION_FIELDS
                .iter()
                .find_map(|name| fields.get(*name).and_then(|v| v.as_str()))
                .map(str::to_string);
            (value, explanation)
        }
        Value::Number(_) => (&parsed, None),
        _ => return Err(PredictionError::Parse("expected a JSON object".to_string())),
    };

    let rating = integral_rating(value)?;
    if !(1..=5).contains(&rating) {
        return Err(PredictionError::OutOfRange(rating));
    }

    Ok((rating as u8, explanation))
}

/// Accept `4` and `4.0`, reject strings and fractions
fn integral_rating(value: &Value) -> Result<i64, PredictionError> {
    if let Some(rating) = value.as_i64() {
        return Ok(rating);
    }
    match value.as_f64() {
        Some(rating) if rating.fract() == 0.0 && rating.abs() < i64::MAX as f64 => Ok(rating as i64),
        Some(rating) => Err(PredictionError::Parse(format!("rating {} is not an integer", rating))),
        None => Err(PredictionError::Parse(format!("rating {} is not a number", value))),
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```)
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse JSON from the response, handling embedded JSON
fn parse_json_response(response: &str) -> Result<Value, PredictionError> {
    match serde_json::from_str(response) {
        Ok(parsed) => Ok(parsed),
        Err(_) => try_extract_embedded_json(response),
    }
}

/// Try to extract JSON that might be embedded in text
fn try_extract_embedded_json(response: &str) -> Result<Value, PredictionError> {
    match response.find('{') {
        Some(start) => match response.rfind('}') {
            Some(end) if end > start => serde_json::from_str(&response[start..=end])
                .map_err(|e| PredictionError::Parse(format!("invalid embedded JSON: {}", e))),
            _ => Err(PredictionError::Parse(
                "found opening brace but no closing brace".to_string(),
            )),
        },
        None => Err(PredictionError::Parse("no JSON found in response".to_string())),
    }
}
