use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::config::Config;

/// Looked up when no `--config` path is given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "seshat.json";

/// Defaults, then an optional JSON file, then `SESHAT_*` environment variables.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let file_json = match path {
        Some(p) => Some(read_json(p)?),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                Some(read_json(fallback)?)
            } else {
                None
            }
        }
    };

    let mut config = match file_json {
        Some(patch) => from_patch(&patch)?,
        None => Config::default(),
    };
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    debug!(path = %path.display(), "Reading config file");
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    if !value.is_object() {
        return Err(Error::Config(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Overlay a partial JSON document on the defaults.
pub fn from_patch(patch: &serde_json::Value) -> Result<Config> {
    let mut base = serde_json::to_value(Config::default())?;
    merge_json(&mut base, patch);
    Ok(serde_json::from_value(base)?)
}

/// Deep merge: objects merge key by key, anything else replaces.
fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) =
        (base, patch)
    {
        for (key, value) in patch_map {
            match base_map.get_mut(key) {
                Some(existing) if existing.is_object() && value.is_object() => {
                    merge_json(existing, value)
                }
                _ => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

/// Apply `SESHAT_*` overrides. `lookup` is `std::env::var` outside tests.
pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("SESHAT_DB_PATH") {
        config.db_path = PathBuf::from(v);
    }
    if let Some(v) = var("SESHAT_CSV_PATH") {
        config.csv_path = PathBuf::from(v);
    }
    if let Some(v) = var("SESHAT_OUTPUT_PATH") {
        config.output_path = PathBuf::from(v);
    }
    if let Some(v) = var("SESHAT_PROMPT_PATH") {
        config.prompt_path = PathBuf::from(v);
    }
    if let Some(v) = var("SESHAT_Z_THRESHOLD") {
        config.detection.z_threshold = parse_env("SESHAT_Z_THRESHOLD", &v)?;
    }
    if let Some(v) = var("SESHAT_DISCOUNT_CUTOFF") {
        config.detection.discount_cutoff = parse_env("SESHAT_DISCOUNT_CUTOFF", &v)?;
    }
    if let Some(v) = var("SESHAT_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = var("SESHAT_LLM_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = var("SESHAT_MAX_CONCURRENCY") {
        config.llm.max_concurrency = parse_env("SESHAT_MAX_CONCURRENCY", &v)?;
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<()> {
    let z = config.detection.z_threshold;
    if !z.is_finite() || z <= 0.0 {
        return Err(Error::Config(format!("z_threshold must be positive, got {}", z)));
    }
    if !config.detection.discount_cutoff.is_finite() {
        return Err(Error::Config("discount_cutoff must be finite".to_string()));
    }
    if config.llm.max_concurrency == 0 {
        return Err(Error::Config("max_concurrency must be at least 1".to_string()));
    }
    let t = config.llm.temperature;
    if !(0.0..=2.0).contains(&t) {
        return Err(Error::Config(format!(
            "temperature must be within [0, 2], got {}",
            t
        )));
    }
    Ok(())
}
