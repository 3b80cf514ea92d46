use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the standard deviation of a metric column is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spread {
    /// Divide by `n`.
    #[default]
    Population,
    /// Divide by `n - 1`.
    Sample,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Rows with `|z| > z_threshold` are flagged.
    pub z_threshold: f64,
    /// Discount tiers strictly above this percentage count as misuse candidates.
    pub discount_cutoff: f64,
    pub spread: Spread,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_threshold: 2.0,
            discount_cutoff: 10.0,
            spread: Spread::Population,
        }
    }
}

/// Settings for the OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the bearer key.
    pub api_key_env: String,
    pub temperature: f32,
    /// Upper bound on explanation requests in flight. `1` is strictly sequential.
    pub max_concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.2,
            max_concurrency: 1,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub csv_path: PathBuf,
    pub output_path: PathBuf,
    pub prompt_path: PathBuf,
    pub detection: DetectionConfig,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/sales_data.db"),
            csv_path: PathBuf::from("data/electronics_sales_report_sample.csv"),
            output_path: PathBuf::from("output/anomaly_report.json"),
            prompt_path: PathBuf::from("prompts/anomaly_explanation_prompt.txt"),
            detection: DetectionConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}
