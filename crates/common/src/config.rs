//! Layered test configuration
//!
//! A [`TestConfig`] is resolved from three layers, applied in a fixed order:
//!
//! 1. built-in defaults ([`TestConfig::defaults`])
//! 2. environment files: `test.toml`, then `test-<environment>.toml`
//! 3. process environment: `PIPETEST_FOO_BAR=x` overrides key `foo.bar`
//!
//! Later layers win per key. [`TestConfig::from_layers`] is the pure
//! resolution step; [`TestConfig::load`] only gathers the layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// One configuration layer: dotted key to raw string value
pub type ConfigLayer = BTreeMap<String, String>;

/// Prefix for process-environment overrides
pub const ENV_PREFIX: &str = "PIPETEST_";

const DEFAULT_ENVIRONMENT: &str = "dev";

/// Resolved test configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    values: ConfigLayer,
}

/// Minimum data-quality percentages a fixture set must reach
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Percentage of non-null cells (0.0 - 100.0)
    pub completeness: f64,

    /// Percentage of non-null cells holding valid values (0.0 - 100.0)
    pub validity: f64,

    /// Percentage of output values matching expected results (0.0 - 100.0).
    /// Needs reference data, so record sets are not checked against it.
    pub accuracy: f64,

    /// Percentage of rows carrying exactly the expected fields (0.0 - 100.0)
    pub consistency: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            completeness: 95.0,
            validity: 97.0,
            accuracy: 98.0,
            consistency: 99.0,
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            values: Self::defaults(),
        }
    }
}

impl TestConfig {
    /// Built-in default layer
    pub fn defaults() -> ConfigLayer {
        [
            ("webdriver.base.url", "https://dev.prophecy.io"),
            ("webdriver.driver", "chrome"),
            ("headless.mode", "false"),
            ("webdriver.timeouts.implicitlywait", "10000"),
            ("webdriver.wait.for.timeout", "30000"),
            ("prophecy.pipeline.execution.timeout", "300000"),
            ("prophecy.data.validation.timeout", "120000"),
            ("test.data.dir", "testdata"),
            ("test.scratch.dir", "temp-testdata"),
            ("csv.delimiter", ","),
            ("environment", DEFAULT_ENVIRONMENT),
            ("parallel.execution", "false"),
            ("thread.count", "2"),
            ("screenshots.on.failure", "true"),
            ("verbose.logging", "false"),
            ("report.output.dir", "test-results"),
            ("data.quality.completeness.threshold", "95.0"),
            ("data.quality.validity.threshold", "97.0"),
            ("data.quality.accuracy.threshold", "98.0"),
            ("data.quality.consistency.threshold", "99.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Resolve a configuration from its three layers.
    ///
    /// Pure: the result depends only on the arguments. Keys present in a
    /// later layer replace those of an earlier one.
    pub fn from_layers(
        defaults: &ConfigLayer,
        env_file: &ConfigLayer,
        process_env: &ConfigLayer,
    ) -> Self {
        let mut values = defaults.clone();
        for layer in [env_file, process_env] {
            for (key, value) in layer {
                values.insert(key.clone(), value.clone());
            }
        }
        Self { values }
    }

    /// Load configuration from `config_dir` and the current process environment
    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::load_with_env(config_dir, env_layer(std::env::vars()))
    }

    /// Load configuration from `config_dir` with an explicit process-environment layer
    pub fn load_with_env(config_dir: &Path, process_env: ConfigLayer) -> Result<Self> {
        let mut env_file = load_env_file(&config_dir.join("test.toml"))?.unwrap_or_default();

        let environment = process_env
            .get("environment")
            .or_else(|| env_file.get("environment"))
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let specific = config_dir.join(format!("test-{}.toml", environment));
        if let Some(layer) = load_env_file(&specific)? {
            env_file.extend(layer);
        }

        let config = Self::from_layers(&Self::defaults(), &env_file, &process_env);
        debug!(
            "Resolved configuration for environment '{}' ({} keys)",
            environment,
            config.values.len()
        );
        Ok(config)
    }

    /// All resolved values
    pub fn values(&self) -> &ConfigLayer {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Integer value, falling back to `default` when absent or unparsable
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Invalid integer value for {}: {}", key, raw);
                default
            }),
            None => default,
        }
    }

    /// Boolean value, falling back to `default` when absent or unparsable
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => {
                    warn!("Invalid boolean value for {}: {}", key, raw);
                    default
                }
            },
            None => default,
        }
    }

    /// Float value, falling back to `default` when absent, unparsable or not finite
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                _ => {
                    warn!("Invalid numeric value for {}: {}", key, raw);
                    default
                }
            },
            None => default,
        }
    }

    fn get_millis(&self, key: &str, default: u64) -> Duration {
        Duration::from_millis(self.get_u64(key, default))
    }

    pub fn base_url(&self) -> &str {
        self.get_or("webdriver.base.url", "https://dev.prophecy.io")
    }

    pub fn browser(&self) -> &str {
        self.get_or("webdriver.driver", "chrome")
    }

    pub fn headless(&self) -> bool {
        self.get_bool("headless.mode", false)
    }

    pub fn implicit_wait(&self) -> Duration {
        self.get_millis("webdriver.timeouts.implicitlywait", 10_000)
    }

    pub fn explicit_wait(&self) -> Duration {
        self.get_millis("webdriver.wait.for.timeout", 30_000)
    }

    pub fn pipeline_execution_timeout(&self) -> Duration {
        self.get_millis("prophecy.pipeline.execution.timeout", 300_000)
    }

    pub fn data_validation_timeout(&self) -> Duration {
        self.get_millis("prophecy.data.validation.timeout", 120_000)
    }

    /// Directory of pre-authored source fixtures
    pub fn test_data_dir(&self) -> PathBuf {
        PathBuf::from(self.get_or("test.data.dir", "testdata"))
    }

    /// Directory for generated scratch fixtures
    pub fn scratch_dir(&self) -> PathBuf {
        PathBuf::from(self.get_or("test.scratch.dir", "temp-testdata"))
    }

    /// CSV delimiter; must be a single ASCII character
    pub fn csv_delimiter(&self) -> u8 {
        match self.get("csv.delimiter").map(str::as_bytes) {
            Some([byte]) if byte.is_ascii() => *byte,
            Some(_) => {
                warn!("csv.delimiter must be a single ASCII character, using ','");
                b','
            }
            None => b',',
        }
    }

    pub fn environment(&self) -> &str {
        self.get_or("environment", DEFAULT_ENVIRONMENT)
    }

    pub fn parallel_execution(&self) -> bool {
        self.get_bool("parallel.execution", false)
    }

    pub fn thread_count(&self) -> usize {
        self.get_u64("thread.count", 2) as usize
    }

    pub fn screenshots_on_failure(&self) -> bool {
        self.get_bool("screenshots.on.failure", true)
    }

    pub fn verbose_logging(&self) -> bool {
        self.get_bool("verbose.logging", false)
    }

    pub fn report_output_dir(&self) -> PathBuf {
        PathBuf::from(self.get_or("report.output.dir", "test-results"))
    }

    pub fn quality_thresholds(&self) -> QualityThresholds {
        let defaults = QualityThresholds::default();
        QualityThresholds {
            completeness: self
                .get_f64("data.quality.completeness.threshold", defaults.completeness),
            validity: self.get_f64("data.quality.validity.threshold", defaults.validity),
            accuracy: self.get_f64("data.quality.accuracy.threshold", defaults.accuracy),
            consistency: self
                .get_f64("data.quality.consistency.threshold", defaults.consistency),
        }
    }
}

/// Build the process-environment layer from `PIPETEST_*` variables.
///
/// `PIPETEST_WEBDRIVER_BASE_URL` becomes `webdriver.base.url`.
pub fn env_layer<I>(vars: I) -> ConfigLayer
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let rest = name.strip_prefix(ENV_PREFIX)?;
            if rest.is_empty() {
                return None;
            }
            Some((rest.to_ascii_lowercase().replace('_', "."), value))
        })
        .collect()
}

/// Load one TOML environment file as a flat layer.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_env_file(path: &Path) -> Result<Option<ConfigLayer>> {
    if !path.exists() {
        warn!("Configuration file not found: {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let table: toml::Table = content
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;

    let mut layer = ConfigLayer::new();
    for (key, value) in &table {
        flatten_toml(key, value, &mut layer);
    }

    info!("Loaded configuration from: {}", path.display());
    Ok(Some(layer))
}

fn flatten_toml(prefix: &str, value: &toml::Value, out: &mut ConfigLayer) {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                flatten_toml(&format!("{}.{}", prefix, key), nested, out);
            }
        }
        toml::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
