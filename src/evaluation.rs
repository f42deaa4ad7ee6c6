use crate::client::TextGenerator;
use crate::config::Config;
use crate::errors::PredictionError;
use crate::models::{ConsistencyTrial, Prediction, RatingOutcome, Review};
use crate::parsing::parse_rating_response;
use crate::strategy::Strategy;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Knobs the evaluator needs, taken from the run configuration
#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    /// Requests per second, non-positive disables the limit
    pub rate_limit_rps: f64,
    pub request_timeout: Duration,
    /// Extra calls per sampled (review, strategy) pair
    pub consistency_repeats: usize,
    /// Number of leading reviews re-run per strategy
    pub consistency_sample: usize,
}

impl From<&Config> for EvaluationSettings {
    fn from(config: &Config) -> Self {
        Self {
            rate_limit_rps: config.model.rate_limit_rps,
            request_timeout: config.request_timeout(),
            consistency_repeats: config.consistency_repeats,
            consistency_sample: config.consistency_sample,
        }
    }
}

/// Predictions and consistency trials of one pass over the dataset
#[derive(Debug, Clone, Default)]
pub struct EvaluationRun {
    pub predictions: Vec<Prediction>,
    pub consistency: Vec<ConsistencyTrial>,
}

/// Runs prompting strategies against reviews, with rate limiting and a bounded wait per call
pub struct Evaluator {
    generator: Box<dyn TextGenerator>,
    settings: EvaluationSettings,
    /// Last request time, for rate limiting
    last_request: Option<Instant>,
}

impl Evaluator {
    pub fn new(generator: Box<dyn TextGenerator>, settings: EvaluationSettings) -> Self {
        Self {
            generator,
            settings,
            last_request: None,
        }
    }

    /// Enforce rate limiting for API requests
    async fn enforce_rate_limit(last_request: &mut Option<Instant>, rate_limit_rps: f64) {
        if rate_limit_rps.is_nan() || rate_limit_rps <= 0.0 {
            return;
        }

        let Ok(min_interval) = Duration::try_from_secs_f64(1.0 / rate_limit_rps) else {
            warn!(rate_limit_rps, "rate limit interval out of range, not limiting");
            return;
        };

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }

    /// Evaluate every review with every strategy, then re-run the consistency sample
    pub async fn evaluate(&mut self, reviews: &[Review], strategies: &[Strategy]) -> EvaluationRun {
        let mut run = EvaluationRun::default();

        for strategy in strategies {
            let total = reviews.len();
            for (index, review) in reviews.iter().enumerate() {
                debug!(%strategy, review = %review.id, "predicting {}/{}", index + 1, total);
                let prediction = self.predict(review, *strategy).await;
                run.predictions.push(prediction);
            }
        }

        if self.settings.consistency_repeats > 0 && self.settings.consistency_sample > 0 {
            let sample = self.settings.consistency_sample.min(reviews.len());
            // predictions are laid out strategy by strategy, each in dataset order
            for (pass, strategy) in strategies.iter().enumerate() {
                let first_runs = &run.predictions[pass * reviews.len()..][..sample];
                let first_ratings: Vec<Option<u8>> =
                    first_runs.iter().map(Prediction::predicted_rating).collect();

                for (review, first_rating) in reviews.iter().zip(first_ratings) {
                    let trial = self.repeat(review, *strategy, first_rating).await;
                    run.consistency.push(trial);
                }
            }
        }

        run
    }

    /// Re-invoke one (review, strategy) pair and record each repeat's rating
    async fn repeat(
        &mut self,
        review: &Review,
        strategy: Strategy,
        first_rating: Option<u8>,
    ) -> ConsistencyTrial {
        debug!(%strategy, review = %review.id, "consistency repeats");

        let mut repeat_ratings = Vec::with_capacity(self.settings.consistency_repeats);
        for _ in 0..self.settings.consistency_repeats {
            let prediction = self.predict(review, strategy).await;
            repeat_ratings.push(prediction.predicted_rating());
        }

        ConsistencyTrial {
            review_id: review.id.clone(),
            strategy,
            first_rating,
            repeat_ratings,
        }
    }

    /// Apply one strategy to one review.
    ///
    /// Always yields a prediction: call failures, timeouts and malformed
    /// answers are recorded on it as an invalid outcome.
    pub async fn predict(&mut self, review: &Review, strategy: Strategy) -> Prediction {
        let prompt = strategy.build_prompt(&review.text);

        Self::enforce_rate_limit(&mut self.last_request, self.settings.rate_limit_rps).await;

        let (raw_response, outcome) =
            match timeout(self.settings.request_timeout, self.generator.generate(&prompt)).await {
                Ok(Ok(text)) => {
                    let outcome = parse_rating_response(&text);
                    (text, outcome)
                }
                Ok(Err(e)) => (
                    String::new(),
                    RatingOutcome::Invalid {
                        reason: PredictionError::Call(e.to_string()),
                    },
                ),
                Err(_) => (
                    String::new(),
                    RatingOutcome::Invalid {
                        reason: PredictionError::Timeout(self.settings.request_timeout.as_secs()),
                    },
                ),
            };

        if let RatingOutcome::Invalid { reason } = &outcome {
            warn!(%strategy, review = %review.id, %reason, "invalid prediction");
        }

        Prediction {
            review_id: review.id.clone(),
            strategy,
            true_rating: review.true_rating,
            raw_response,
            outcome,
        }
    }
}
