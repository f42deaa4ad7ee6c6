use crate::strategy::Strategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which text generation API to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Any OpenAI-compatible chat completions endpoint
    #[default]
    Openai,
    /// Google Gemini `generateContent`
    Gemini,
}

/// Settings for the model that produces ratings and replies
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: Provider,
    /// API base URL
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    pub env_var_api_key: String,
    /// Model identifier
    pub model: String,
    /// Temperature for response generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Rate limit for API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
    /// Optional system message sent ahead of every prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Root configuration of a run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// CSV file with the labelled reviews
    pub dataset_path: PathBuf,
    /// Number of reviews to read from the dataset, all of them when absent
    #[serde(default)]
    pub limit: Option<usize>,
    /// Directory receiving predictions.csv, metrics.csv and report.json
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Strategies to evaluate, in reporting order
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,
    /// Extra calls per sampled (review, strategy) pair
    #[serde(default = "default_consistency_repeats")]
    pub consistency_repeats: usize,
    /// Leading reviews re-run for the consistency score
    #[serde(default = "default_consistency_sample")]
    pub consistency_sample: usize,
    /// Upper bound on a single model call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    pub model: ModelConfig,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_strategies() -> Vec<Strategy> {
    Strategy::ALL.to_vec()
}

fn default_consistency_repeats() -> usize {
    3
}

fn default_consistency_sample() -> usize {
    20
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            anyhow::bail!("At least one strategy must be configured");
        }
        let mut seen = Vec::new();
        for strategy in &self.strategies {
            if seen.contains(strategy) {
                anyhow::bail!("Strategy {} is listed more than once", strategy);
            }
            seen.push(*strategy);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        let rps = self.model.rate_limit_rps;
        if !rps.is_finite() {
            anyhow::bail!("rate_limit_rps must be a finite number, got {}", rps);
        }
        if rps > 0.0 && Duration::try_from_secs_f64(1.0 / rps).is_err() {
            anyhow::bail!("rate_limit_rps {} is too small to pace requests", rps);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
