use crate::models::{EvaluationReport, Prediction, StrategyMetrics};
use crate::respond::FeedbackReply;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

const METRICS_HEADER: [&str; 8] = [
    "strategy",
    "accuracy",
    "within_one_accuracy",
    "mae",
    "json_validity_rate",
    "consistency_score",
    "valid",
    "total",
];

const PREDICTIONS_HEADER: [&str; 7] = [
    "review_id",
    "strategy",
    "true_rating",
    "predicted_rating",
    "is_valid_json",
    "error",
    "raw_response",
];

/// Round for presentation only
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn format_rate(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.3}", round3(value)),
        None => "n/a".to_string(),
    }
}

/// One row per strategy, rounded, for JSON output
#[derive(Serialize)]
struct MetricsRow<'a> {
    strategy: &'a str,
    accuracy: Option<f64>,
    within_one_accuracy: Option<f64>,
    mae: Option<f64>,
    json_validity_rate: f64,
    consistency_score: Option<f64>,
    valid: usize,
    total: usize,
}

impl<'a> From<&'a StrategyMetrics> for MetricsRow<'a> {
    fn from(m: &'a StrategyMetrics) -> Self {
        Self {
            strategy: m.strategy.name(),
            accuracy: m.accuracy.map(round3),
            within_one_accuracy: m.within_one_accuracy.map(round3),
            mae: m.mae.map(round3),
            json_validity_rate: round3(m.json_validity_rate),
            consistency_score: m.consistency_score.map(round3),
            valid: m.valid,
            total: m.total,
        }
    }
}

/// Render the metrics table as aligned plain text
pub fn render_metrics_plain(metrics: &[StrategyMetrics]) -> String {
    if metrics.is_empty() {
        return "No metrics available.\n".to_string();
    }

    let mut table = format!(
        "{:<10} {:>9} {:>11} {:>7} {:>14} {:>12} {:>7} {:>7}\n",
        "Strategy", "Accuracy", "Within-one", "MAE", "JSON validity", "Consistency", "Valid", "Total"
    );
    table.push_str(&"-".repeat(84));
    table.push('\n');

    for m in metrics {
        table.push_str(&format!(
            "{:<10} {:>9} {:>11} {:>7} {:>14} {:>12} {:>7} {:>7}\n",
            m.strategy.name(),
            format_rate(m.accuracy),
            format_rate(m.within_one_accuracy),
            format_rate(m.mae),
            format_rate(Some(m.json_validity_rate)),
            format_rate(m.consistency_score),
            m.valid,
            m.total
        ));
    }

    table
}

/// Render the metrics table as a JSON array
pub fn render_metrics_json(metrics: &[StrategyMetrics]) -> Result<String> {
    let rows: Vec<MetricsRow> = metrics.iter().map(MetricsRow::from).collect();
    serde_json::to_string_pretty(&rows).context("Failed to serialize metrics to JSON")
}

/// Render the metrics table as CSV, undefined values left empty
pub fn render_metrics_csv(metrics: &[StrategyMetrics]) -> Result<String> {
    let optional = |value: Option<f64>| value.map(|v| format!("{:.3}", round3(v))).unwrap_or_default();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(METRICS_HEADER)?;
    for m in metrics {
        writer.write_record([
            m.strategy.name().to_string(),
            optional(m.accuracy),
            optional(m.within_one_accuracy),
            optional(m.mae),
            format!("{:.3}", round3(m.json_validity_rate)),
            optional(m.consistency_score),
            m.valid.to_string(),
            m.total.to_string(),
        ])?;
    }
    into_string(writer)
}

/// Render the predictions table as CSV in run order: strategy by strategy, each in dataset order
pub fn render_predictions_csv(predictions: &[Prediction]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PREDICTIONS_HEADER)?;
    for p in predictions {
        writer.write_record([
            p.review_id.clone(),
            p.strategy.name().to_string(),
            p.true_rating.to_string(),
            p.predicted_rating().map(|r| r.to_string()).unwrap_or_default(),
            p.is_valid_json().to_string(),
            p.error().map(|e| e.to_string()).unwrap_or_default(),
            p.raw_response.clone(),
        ])?;
    }
    into_string(writer)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Print the metrics table in the specified format
pub fn print_metrics(metrics: &[StrategyMetrics], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Plain => print!("{}", render_metrics_plain(metrics)),
        OutputFormat::Json => println!("{}", render_metrics_json(metrics)?),
    }
    Ok(())
}

/// Print a feedback reply in the specified format
pub fn print_reply(reply: &FeedbackReply, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Plain => {
            println!("Response to customer: {}", reply.customer_response);
            println!("Summary: {}", reply.summary);
            println!("Suggestions:");
            for suggestion in &reply.suggestions {
                println!("  • {}", suggestion);
            }
            println!("Source: {}", reply.source);
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(reply).context("Failed to serialize reply to JSON")?
        ),
    }
    Ok(())
}

/// Write metrics.csv, predictions.csv and report.json into `dir`
pub fn store_report(report: &EvaluationReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    write_artifact(&dir.join("metrics.csv"), &render_metrics_csv(&report.metrics)?)?;
    write_artifact(&dir.join("predictions.csv"), &render_predictions_csv(&report.predictions)?)?;

    let json = serde_json::to_string_pretty(report).context("Failed to serialize results to JSON")?;
    write_artifact(&dir.join("report.json"), &json)?;

    tracing::info!(dir = %dir.display(), "results stored");
    Ok(())
}

fn write_artifact(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write results to: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PredictionError;
    use crate::models::RatingOutcome;
    use crate::strategy::Strategy;
    use tempfile::tempdir;

    fn metrics() -> Vec<StrategyMetrics> {
        vec![
            StrategyMetrics {
                strategy: Strategy::Direct,
                total: 3,
                valid: 3,
                accuracy: Some(2.0 / 3.0),
                within_one_accuracy: Some(1.0),
                mae: Some(1.0 / 3.0),
                json_validity_rate: 1.0,
                consistency_score: Some(0.5),
            },
            StrategyMetrics {
                strategy: Strategy::FewShot,
                total: 3,
                valid: 0,
                accuracy: None,
                within_one_accuracy: None,
                mae: None,
                json_validity_rate: 0.0,
                consistency_score: None,
            },
        ]
    }

    fn predictions() -> Vec<Prediction> {
        vec![
            Prediction {
                review_id: "2".to_string(),
                strategy: Strategy::Rubric,
                true_rating: 4,
                raw_response: "{\"rating\": 4}".to_string(),
                outcome: RatingOutcome::Valid {
                    rating: 4,
                    explanation: None,
                },
            },
            Prediction {
                review_id: "1".to_string(),
                strategy: Strategy::Direct,
                true_rating: 2,
                raw_response: "two, \"maybe\"".to_string(),
                outcome: RatingOutcome::Invalid {
                    reason: PredictionError::Parse("no JSON found in response".to_string()),
                },
            },
        ]
    }

    #[test]
    fn test_plain_table_rounds_and_marks_undefined() {
        let table = render_metrics_plain(&metrics());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Strategy"));
        assert!(lines[2].starts_with("direct"));
        assert!(lines[2].contains("0.667"));
        assert!(lines[2].contains("0.333"));
        assert!(lines[3].starts_with("few_shot"));
        assert!(lines[3].contains("n/a"));
    }

    #[test]
    fn test_plain_table_empty() {
        assert_eq!(render_metrics_plain(&[]), "No metrics available.\n");
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let metrics = metrics();
        assert_eq!(render_metrics_plain(&metrics), render_metrics_plain(&metrics));
        assert_eq!(render_metrics_json(&metrics).unwrap(), render_metrics_json(&metrics).unwrap());
        assert_eq!(render_metrics_csv(&metrics).unwrap(), render_metrics_csv(&metrics).unwrap());
    }

    #[test]
    fn test_json_rows_use_null_for_undefined() {
        let json: serde_json::Value = serde_json::from_str(&render_metrics_json(&metrics()).unwrap()).unwrap();

        assert_eq!(json[0]["strategy"], "direct");
        assert_eq!(json[0]["accuracy"], 0.667);
        assert_eq!(json[1]["strategy"], "few_shot");
        assert!(json[1]["accuracy"].is_null());
        assert!(json[1]["mae"].is_null());
        assert_eq!(json[1]["json_validity_rate"], 0.0);
    }

    #[test]
    fn test_metrics_csv() {
        let csv = render_metrics_csv(&metrics()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "strategy,accuracy,within_one_accuracy,mae,json_validity_rate,consistency_score,valid,total"
        );
        assert_eq!(lines[1], "direct,0.667,1.000,0.333,1.000,0.500,3,3");
        assert_eq!(lines[2], "few_shot,,,,0.000,,0,3");
    }

    #[test]
    fn test_predictions_csv_keeps_run_order_and_escapes() {
        let mut predictions = predictions();
        let mut tenth = predictions[0].clone();
        tenth.review_id = "10".to_string();
        predictions.insert(1, tenth);

        let csv = render_predictions_csv(&predictions).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 3);
        let ids: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
        assert_eq!(ids, vec!["2", "10", "1"]);
        assert_eq!(&rows[0][1], "rubric");
        assert_eq!(&rows[0][3], "4");
        assert_eq!(&rows[0][4], "true");
        assert_eq!(&rows[2][1], "direct");
        assert_eq!(&rows[2][3], "");
        assert_eq!(&rows[2][4], "false");
        assert!(rows[2][5].contains("no JSON found"));
        assert_eq!(&rows[2][6], "two, \"maybe\"");
    }

    #[test]
    fn test_store_report() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("nested").join("results");

        let report = EvaluationReport {
            metrics: metrics(),
            predictions: predictions(),
            consistency: vec![],
        };
        store_report(&report, &dir).unwrap();

        assert!(dir.join("metrics.csv").exists());
        assert!(dir.join("predictions.csv").exists());
        let content = std::fs::read_to_string(dir.join("report.json")).unwrap();
        assert!(content.contains("metrics"));
        assert!(content.contains("predictions"));
        assert!(content.contains("few_shot"));
    }

    #[test]
    fn test_store_report_unwritable_path() {
        let report = EvaluationReport {
            metrics: vec![],
            predictions: vec![],
            consistency: vec![],
        };
        assert!(store_report(&report, Path::new("/dev/null/results")).is_err());
    }
}
