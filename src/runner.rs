use crate::client::{TextGenerator, build_generator};
use crate::config::Config;
use crate::dataset::load_reviews;
use crate::evaluation::{EvaluationSettings, Evaluator};
use crate::metrics::calculate_metrics;
use crate::models::EvaluationReport;
use crate::output::store_report;
use anyhow::{Context, Result};
use tracing::info;

/// Main runner that orchestrates the evaluation process
pub struct Runner {
    config: Config,
    evaluator: Evaluator,
}

impl Runner {
    /// Create a runner talking to the configured provider
    pub fn new(config: Config) -> Result<Self> {
        let generator = build_generator(&config.model).context("Failed to set up text generator")?;
        Ok(Self::with_generator(config, generator))
    }

    /// Create a runner around an existing generator
    pub fn with_generator(config: Config, generator: Box<dyn TextGenerator>) -> Self {
        let settings = EvaluationSettings::from(&config);
        Self {
            config,
            evaluator: Evaluator::new(generator, settings),
        }
    }

    /// Load the dataset, evaluate every strategy, and store the artifacts.
    ///
    /// Only dataset loading and artifact storage can fail; individual
    /// predictions never abort the run.
    pub async fn run_evaluation(&mut self) -> Result<EvaluationReport> {
        let reviews = load_reviews(&self.config.dataset_path, self.config.limit)?;
        info!(
            reviews = reviews.len(),
            strategies = self.config.strategies.len(),
            "starting evaluation"
        );

        let run = self.evaluator.evaluate(&reviews, &self.config.strategies).await;

        let metrics = calculate_metrics(&self.config.strategies, &run.predictions, &run.consistency);
        for m in &metrics {
            info!(
                strategy = %m.strategy,
                valid = m.valid,
                total = m.total,
                accuracy = ?m.accuracy,
                mae = ?m.mae,
                "strategy finished"
            );
        }

        let report = EvaluationReport {
            metrics,
            predictions: run.predictions,
            consistency: run.consistency,
        };

        store_report(&report, &self.config.output_dir)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{FixedGenerator, ScriptedGenerator};
    use crate::config::{ModelConfig, Provider};
    use crate::strategy::Strategy;
    use std::io::Write;
    use std::path::Path;
    use tempfile::{NamedTempFile, TempDir, tempdir};

    fn create_test_config(dataset_path: &Path, output_dir: &Path) -> Config {
        Config {
            dataset_path: dataset_path.to_path_buf(),
            limit: Some(200),
            output_dir: output_dir.to_path_buf(),
            strategies: Strategy::ALL.to_vec(),
            consistency_repeats: 0,
            consistency_sample: 0,
            request_timeout_secs: 5,
            model: ModelConfig {
                provider: Provider::Openai,
                api_endpoint: "https://api.openai.com/v1".to_string(),
                env_var_api_key: "TEST_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: 1000,
                rate_limit_rps: 0.0,
                system_prompt: None,
            },
        }
    }

    fn dataset(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "review_id,text,stars\n{}", rows).unwrap();
        file
    }

    fn scenario() -> (NamedTempFile, TempDir) {
        let file = dataset("a,Loved every bite,5\nb,Never coming back,1\nc,Average lunch spot,3\n");
        (file, tempdir().unwrap())
    }

    #[tokio::test]
    async fn test_run_evaluation_scenario() {
        let (file, out) = scenario();
        let config = create_test_config(file.path(), out.path());
        let generator = ScriptedGenerator::new(&[
            ("Loved every bite", r#"{"predicted_stars": 5}"#),
            ("Never coming back", r#"{"predicted_stars": 2}"#),
            ("Average lunch spot", r#"{"predicted_stars": 3}"#),
        ]);

        let mut runner = Runner::with_generator(config, Box::new(generator));
        let report = runner.run_evaluation().await.unwrap();

        assert_eq!(report.predictions.len(), 9);
        assert_eq!(report.metrics.len(), 3);
        for m in &report.metrics {
            assert!((m.accuracy.unwrap() - 2.0 / 3.0).abs() < 1e-9);
            assert!((m.mae.unwrap() - 1.0 / 3.0).abs() < 1e-9);
            assert_eq!(m.json_validity_rate, 1.0);
        }

        assert!(out.path().join("metrics.csv").exists());
        assert!(out.path().join("predictions.csv").exists());
        assert!(out.path().join("report.json").exists());
    }

    #[tokio::test]
    async fn test_run_evaluation_all_malformed() {
        let (file, out) = scenario();
        let mut config = create_test_config(file.path(), out.path());
        config.consistency_repeats = 2;
        config.consistency_sample = 1;

        let mut runner =
            Runner::with_generator(config, Box::new(FixedGenerator("no idea".to_string())));
        let report = runner.run_evaluation().await.unwrap();

        for m in &report.metrics {
            assert_eq!(m.json_validity_rate, 0.0);
            assert_eq!(m.accuracy, None);
            assert_eq!(m.mae, None);
            assert_eq!(m.consistency_score, Some(0.0));
        }
    }

    #[tokio::test]
    async fn test_run_evaluation_perfect_model() {
        let (file, out) = scenario();
        let mut config = create_test_config(file.path(), out.path());
        config.strategies = vec![Strategy::FewShot];
        config.consistency_repeats = 3;
        config.consistency_sample = 2;

        let generator = ScriptedGenerator::new(&[
            ("Loved every bite", "5"),
            ("Never coming back", "1"),
            ("Average lunch spot", "3"),
        ]);
        let mut runner = Runner::with_generator(config, Box::new(generator));
        let report = runner.run_evaluation().await.unwrap();

        assert_eq!(report.metrics.len(), 1);
        assert_eq!(report.metrics[0].strategy, Strategy::FewShot);
        assert_eq!(report.metrics[0].accuracy, Some(1.0));
        assert_eq!(report.metrics[0].mae, Some(0.0));
        assert_eq!(report.metrics[0].consistency_score, Some(1.0));
        assert_eq!(report.consistency.len(), 2);
    }

    #[tokio::test]
    async fn test_run_evaluation_respects_limit() {
        let (file, out) = scenario();
        let mut config = create_test_config(file.path(), out.path());
        config.limit = Some(2);
        config.strategies = vec![Strategy::Direct];

        let mut runner =
            Runner::with_generator(config, Box::new(FixedGenerator("{\"rating\": 4}".to_string())));
        let report = runner.run_evaluation().await.unwrap();

        assert_eq!(report.predictions.len(), 2);
    }

    #[tokio::test]
    async fn test_run_evaluation_missing_dataset_is_fatal() {
        let out = tempdir().unwrap();
        let config = create_test_config(Path::new("/nonexistent/reviews.csv"), out.path());
        let generator = ScriptedGenerator::new(&[]);

        let mut runner = Runner::with_generator(config, Box::new(generator));
        let result = runner.run_evaluation().await;

        assert!(result.unwrap_err().to_string().contains("Failed to open dataset"));
        assert!(!out.path().join("report.json").exists());
    }

    #[test]
    fn test_runner_new_missing_api_key() {
        let out = tempdir().unwrap();
        let mut config = create_test_config(Path::new("reviews.csv"), out.path());
        config.model.env_var_api_key = "REVIEW_EVAL_RUNNER_MISSING_KEY".to_string();
        unsafe {
            std::env::remove_var(&config.model.env_var_api_key);
        }

        let result = Runner::new(config);
        assert!(result.is_err());
    }
}
