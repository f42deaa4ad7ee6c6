use crate::models::{ConsistencyTrial, Prediction, StrategyMetrics};
use crate::strategy::Strategy;

/// Compute metrics for each strategy, in the order given
pub fn calculate_metrics(
    strategies: &[Strategy],
    predictions: &[Prediction],
    consistency: &[ConsistencyTrial],
) -> Vec<StrategyMetrics> {
    strategies
        .iter()
        .map(|strategy| strategy_metrics(*strategy, predictions, consistency))
        .collect()
}

/// Metrics for a single strategy.
///
/// Accuracy, within-one accuracy and MAE only look at valid predictions and
/// are `None` when there are none.
pub fn strategy_metrics(
    strategy: Strategy,
    predictions: &[Prediction],
    consistency: &[ConsistencyTrial],
) -> StrategyMetrics {
    let own: Vec<&Prediction> = predictions.iter().filter(|p| p.strategy == strategy).collect();
    let errors: Vec<u8> = own
        .iter()
        .filter_map(|p| p.predicted_rating().map(|rating| rating.abs_diff(p.true_rating)))
        .collect();

    let total = own.len();
    let valid = errors.len();

    StrategyMetrics {
        strategy,
        total,
        valid,
        accuracy: fraction(errors.iter().filter(|e| **e == 0).count(), valid),
        within_one_accuracy: fraction(errors.iter().filter(|e| **e <= 1).count(), valid),
        mae: mean(&errors),
        json_validity_rate: fraction(valid, total).unwrap_or(0.0),
        consistency_score: consistency_score(strategy, consistency),
    }
}

/// Share of repeats that reproduced the first run's valid rating
fn consistency_score(strategy: Strategy, consistency: &[ConsistencyTrial]) -> Option<f64> {
    let (agreeing, repeats) = consistency
        .iter()
        .filter(|t| t.strategy == strategy)
        .fold((0, 0), |(agreeing, repeats), trial| {
            (agreeing + trial.agreeing_repeats(), repeats + trial.repeat_ratings.len())
        });
    fraction(agreeing, repeats)
}

fn fraction(count: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(count as f64 / total as f64)
}

fn mean(values: &[u8]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|v| *v as f64).sum();
    Some(sum / values.len() as f64)
}
