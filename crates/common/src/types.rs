//! Core types for pipetest fixtures

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single structured record: field name to value, in insertion order
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Storage format of a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureFormat {
    Json,
    Csv,
}

impl FixtureFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(FixtureFormat::Json),
            "csv" => Some(FixtureFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FixtureFormat::Json => "json",
            FixtureFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for FixtureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureFormat::Json => write!(f, "JSON"),
            FixtureFormat::Csv => write!(f, "CSV"),
        }
    }
}

/// A fixture file known to the data manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Logical name (file name relative to its directory)
    pub name: String,

    /// Absolute storage path
    pub path: PathBuf,

    pub format: FixtureFormat,

    /// SHA-256 of the file contents, hex encoded
    #[serde(default)]
    pub digest: Option<String>,
}

/// Result of an advisory validation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub diagnostic: String,
}

impl ValidationOutcome {
    pub fn pass(diagnostic: impl Into<String>) -> Self {
        Self {
            passed: true,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            passed: false,
            diagnostic: diagnostic.into(),
        }
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.passed { "passed" } else { "failed" };
        write!(f, "{}: {}", status, self.diagnostic)
    }
}

/// CSV dialect used when reading and writing fixtures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter, a single ASCII byte
    pub delimiter: u8,

    /// Whether the first line is a header row
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }
}

/// One field of a synthetic record and the generator that fills it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Description of a synthetic record set to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Number of records to produce
    pub count: usize,

    /// Per-value probability of a null (0.0 - 1.0)
    #[serde(default)]
    pub null_rate: f64,

    /// Per-value probability of an invalid sentinel among non-null values (0.0 - 1.0)
    #[serde(default)]
    pub invalid_rate: f64,

    /// Fields in output order
    pub fields: Vec<FieldSpec>,

    /// Seed for reproducible output
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(count: usize, fields: Vec<FieldSpec>) -> Self {
        Self {
            count,
            null_rate: 0.0,
            invalid_rate: 0.0,
            fields,
            seed: None,
        }
    }

    pub fn with_null_rate(mut self, rate: f64) -> Self {
        self.null_rate = rate;
        self
    }

    pub fn with_invalid_rate(mut self, rate: f64) -> Self {
        self.invalid_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Synthetic customer rows, the shape pipeline data-source scenarios upload
    pub fn customers(count: usize) -> Self {
        Self::new(
            count,
            vec![
                FieldSpec::new("customer_id", "customer-id"),
                FieldSpec::new("first_name", "first-name"),
                FieldSpec::new("last_name", "last-name"),
                FieldSpec::new("email", "email"),
                FieldSpec::new("city", "city"),
                FieldSpec::new("country", "country"),
                FieldSpec::new("age", "integer-range"),
                FieldSpec::new("signup_date", "date"),
            ],
        )
    }
}
