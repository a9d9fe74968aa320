use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunables for the event collector: output compression, truncation, and
/// optional write buffering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub compression_enabled: bool,
    pub max_output_length: usize,
    pub buffered: bool,
    pub buffer_max_size: usize,
    pub buffer_max_age_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            compression_enabled: true,
            max_output_length: 4096,
            buffered: false,
            buffer_max_size: 50,
            buffer_max_age_secs: 5,
        }
    }
}

/// Tunables for the registry's periodic drift/staleness/failure-spike scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub drift_threshold: f64,
    pub auto_retire_on_drift: bool,
    pub auto_retire_after_days: i64,
    pub failure_spike_threshold: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.5,
            auto_retire_on_drift: false,
            auto_retire_after_days: 30,
            failure_spike_threshold: 0.3,
        }
    }
}

/// Tunables for the synthesis orchestrator's pre-flight guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Candidates with a mined failure rate above this are rejected before
    /// an LLM call is made.
    pub max_failure_rate: f64,
    /// Upper bound on how many steps a proposal's `parallelizable_with`
    /// reconciliation may group together.
    pub max_parallel_steps: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_failure_rate: 0.3,
            max_parallel_steps: 2,
        }
    }
}

/// Tunables for calls through the LLMProvider boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            request_timeout_secs: 120,
            max_attempts: 3,
        }
    }
}

/// Root configuration object, loaded hierarchically from disk and environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace_path: Option<String>,
    pub collector: CollectorConfig,
    pub registry: RegistryConfig,
    pub synthesis: SynthesisConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from (1) a user defaults file, (2) a project override
    /// file, and (3) `TWINRAVEN__SECTION__KEY` environment overrides, in that
    /// priority order (later sources win), then validate.
    ///
    /// Invalid configuration is fatal: it is surfaced here, before any component
    /// is constructed.
    pub fn load_and_validate(
        user_path: Option<&Path>,
        project_path: Option<&Path>,
    ) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = user_path {
            if path.exists() {
                merge_file(&mut merged, path)?;
            }
        }
        if let Some(path) = project_path {
            if path.exists() {
                merge_file(&mut merged, path)?;
            }
        }
        apply_env_overrides(&mut merged);

        let config: Config = merged
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.registry.drift_threshold) {
            return Err(Error::Config(format!(
                "registry.drift_threshold out of range: {}",
                self.registry.drift_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.registry.failure_spike_threshold) {
            return Err(Error::Config(format!(
                "registry.failure_spike_threshold out of range: {}",
                self.registry.failure_spike_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.synthesis.max_failure_rate) {
            return Err(Error::Config(format!(
                "synthesis.max_failure_rate out of range: {}",
                self.synthesis.max_failure_rate
            )));
        }
        if self.synthesis.max_parallel_steps == 0 {
            return Err(Error::Config(
                "synthesis.max_parallel_steps must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature out of range: {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_attempts == 0 {
            return Err(Error::Config(
                "llm.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn merge_file(base: &mut toml::Value, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let parsed: toml::Value = toml::from_str(&text)?;
    merge_values(base, parsed);
    Ok(())
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

/// Apply `TWINRAVEN__SECTION__KEY` environment overrides, splitting the suffix on
/// `__` to address nested TOML tables.
fn apply_env_overrides(base: &mut toml::Value) {
    const PREFIX: &str = "TWINRAVEN__";
    let overrides: BTreeMap<String, String> = std::env::vars()
        .filter(|(k, _)| k.starts_with(PREFIX))
        .map(|(k, v)| (k[PREFIX.len()..].to_string(), v))
        .collect();

    for (path, raw_value) in overrides {
        let segments: Vec<String> = path.split("__").map(|s| s.to_lowercase()).collect();
        if segments.is_empty() {
            continue;
        }
        set_path(base, &segments, parse_env_value(&raw_value));
    }
}

fn parse_env_value(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(raw.to_string())
}

fn set_path(base: &mut toml::Value, segments: &[String], value: toml::Value) {
    if !base.is_table() {
        *base = toml::Value::Table(toml::map::Map::new());
    }
    let table = base.as_table_mut().expect("just ensured table");

    if segments.len() == 1 {
        table.insert(segments[0].clone(), value);
        return;
    }

    let entry = table
        .entry(segments[0].clone())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    set_path(entry, &segments[1..], value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn project_file_overrides_user_file() {
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "[registry]\ndrift_threshold = 0.5").unwrap();
        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "[registry]\ndrift_threshold = 0.75").unwrap();

        let config =
            Config::load_and_validate(Some(user.path()), Some(project.path())).unwrap();
        assert_eq!(config.registry.drift_threshold, 0.75);
    }

    #[test]
    fn env_override_wins_over_files() {
        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "[registry]\ndrift_threshold = 0.75").unwrap();

        std::env::set_var("TWINRAVEN__REGISTRY__DRIFT_THRESHOLD", "0.9");
        let config = Config::load_and_validate(None, Some(project.path())).unwrap();
        std::env::remove_var("TWINRAVEN__REGISTRY__DRIFT_THRESHOLD");

        assert_eq!(config.registry.drift_threshold, 0.9);
    }

    #[test]
    fn out_of_range_threshold_is_fatal() {
        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "[registry]\ndrift_threshold = 5.0").unwrap();
        let result = Config::load_and_validate(None, Some(project.path()));
        assert!(result.is_err());
    }
}
