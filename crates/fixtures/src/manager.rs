//! Source and scratch fixture management

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use once_cell::sync::OnceCell;
use pipetest_common::{
    CsvOptions, Error, Fixture, FixtureFormat, GenerationRequest, Record, Result, TestConfig,
    ValidationOutcome,
};
use serde::de::IgnoredAny;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::csv_codec;
use crate::generate::{self, GeneratorRegistry};
use crate::naming;
use crate::quality::{self, QualityReport};
use crate::validate;

/// Attempts at finding an unused scratch name before giving up
const MAX_NAME_ATTEMPTS: usize = 8;

/// Where fixtures live and how CSV is written
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSettings {
    /// Directory of pre-authored fixtures (read only)
    pub source_dir: PathBuf,

    /// Directory for generated fixtures
    pub scratch_dir: PathBuf,

    pub csv: CsvOptions,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("testdata"),
            scratch_dir: PathBuf::from("temp-testdata"),
            csv: CsvOptions::default(),
        }
    }
}

impl FixtureSettings {
    /// Settings taken from a resolved test configuration
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            source_dir: config.test_data_dir(),
            scratch_dir: config.scratch_dir(),
            csv: CsvOptions {
                delimiter: config.csv_delimiter(),
                ..CsvOptions::default()
            },
        }
    }
}

/// Produces, reads, validates and purges JSON/CSV fixtures.
///
/// Source fixtures are only ever read. Scratch fixtures get unique names and
/// stay on disk until [`FixtureDataManager::cleanup_scratch`] is called.
/// The manager is `Send + Sync`; concurrent writers rely on unique naming,
/// not on locking.
pub struct FixtureDataManager {
    source_dir: PathBuf,
    scratch_dir: PathBuf,
    csv: CsvOptions,
    scratch_ready: OnceCell<()>,
    generators: GeneratorRegistry,
}

impl FixtureDataManager {
    /// Create a manager. No directories are created yet.
    pub fn new(settings: FixtureSettings) -> Result<Self> {
        let source_dir = absolutize(&settings.source_dir)?;
        let scratch_dir = absolutize(&settings.scratch_dir)?;

        if source_dir == scratch_dir {
            return Err(Error::InvalidConfig(format!(
                "source and scratch directories must differ: {}",
                source_dir.display()
            )));
        }

        debug!(
            "Fixture manager: source {} scratch {}",
            source_dir.display(),
            scratch_dir.display()
        );

        Ok(Self {
            source_dir,
            scratch_dir,
            csv: settings.csv,
            scratch_ready: OnceCell::new(),
            generators: GeneratorRegistry::with_defaults(),
        })
    }

    /// Create a manager from a resolved test configuration
    pub fn from_config(config: &TestConfig) -> Result<Self> {
        Self::new(FixtureSettings::from_config(config))
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn csv_options(&self) -> CsvOptions {
        self.csv
    }

    pub fn generator_registry(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// Register custom generator kinds here
    pub fn generator_registry_mut(&mut self) -> &mut GeneratorRegistry {
        &mut self.generators
    }

    /// Absolute path of the source fixture `name`
    pub fn resolve_source_path(&self, name: &str) -> Result<PathBuf> {
        check_fixture_name(name)?;

        let path = self.source_dir.join(name);
        if !path.is_file() {
            return Err(Error::FixtureNotFound { path });
        }
        Ok(path)
    }

    /// Path, format and content digest of the source fixture `name`
    pub fn describe_source(&self, name: &str) -> Result<Fixture> {
        let path = self.resolve_source_path(name)?;
        let format = FixtureFormat::from_path(&path).ok_or_else(|| {
            Error::invalid_format("fixture", format!("unsupported file type: {}", name))
        })?;
        let digest = hash_file(&path)?;

        Ok(Fixture {
            name: name.to_string(),
            path,
            format,
            digest: Some(digest),
        })
    }

    /// Every JSON and CSV fixture under the source directory, sorted by name
    pub fn list_source_fixtures(&self) -> Result<Vec<Fixture>> {
        if !self.source_dir.is_dir() {
            debug!("Source directory {} does not exist", self.source_dir.display());
            return Ok(Vec::new());
        }

        let mut fixtures: Vec<Fixture> = WalkDir::new(&self.source_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let format = FixtureFormat::from_path(e.path())?;
                let relative = e.path().strip_prefix(&self.source_dir).ok()?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some(Fixture {
                    name,
                    path: e.path().to_path_buf(),
                    format,
                    digest: None,
                })
            })
            .collect();

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Serialize `content` as JSON into a new scratch file
    pub fn write_scratch_json<T: Serialize + ?Sized>(&self, content: &T) -> Result<PathBuf> {
        let value = serde_json::to_value(content).map_err(|e| Error::invalid_format("JSON", e))?;
        let text = serde_json::to_string_pretty(&value).map_err(|e| Error::invalid_format("JSON", e))?;
        self.create_scratch_file(FixtureFormat::Json, text.as_bytes())
    }

    /// Write already-encoded JSON text into a new scratch file.
    ///
    /// The text is checked first; malformed JSON is never written.
    pub fn write_scratch_json_str(&self, text: &str) -> Result<PathBuf> {
        serde_json::from_str::<IgnoredAny>(text).map_err(|e| Error::invalid_format("JSON", e))?;
        self.create_scratch_file(FixtureFormat::Json, text.as_bytes())
    }

    /// Write `rows` as CSV into a new scratch file
    pub fn write_scratch_csv(&self, rows: &[Record]) -> Result<PathBuf> {
        let mut buf = Vec::new();
        csv_codec::write_records(&mut buf, rows, self.csv)?;
        self.create_scratch_file(FixtureFormat::Csv, &buf)
    }

    /// Parse a JSON fixture file
    pub fn read_json(&self, path: &Path) -> Result<Value> {
        let content = read_fixture(path)?;
        serde_json::from_slice(&content)
            .map_err(|e| Error::invalid_format("JSON", format!("{}: {}", path.display(), e)))
    }

    /// Parse a CSV fixture file; every value comes back as a string
    pub fn read_csv(&self, path: &Path) -> Result<Vec<Record>> {
        let content = read_fixture(path)?;
        csv_codec::read_records(content.as_slice(), self.csv)
    }

    /// Resolve and parse the JSON source fixture `name`
    pub fn read_source_json(&self, name: &str) -> Result<Value> {
        let path = self.resolve_source_path(name)?;
        self.read_json(&path)
    }

    /// Resolve and parse the CSV source fixture `name`
    pub fn read_source_csv(&self, name: &str) -> Result<Vec<Record>> {
        let path = self.resolve_source_path(name)?;
        self.read_csv(&path)
    }

    pub fn validate_json_syntax(&self, text: &str) -> ValidationOutcome {
        validate::validate_json_syntax(text)
    }

    pub fn validate_csv_shape(
        &self,
        text: &str,
        delimiter: char,
        has_header: bool,
    ) -> ValidationOutcome {
        validate::validate_csv_shape(text, delimiter, has_header)
    }

    /// Generate synthetic rows with this manager's generator registry
    pub fn generate_synthetic_records(&self, request: &GenerationRequest) -> Result<Vec<Record>> {
        generate::generate_records(request, &self.generators)
    }

    /// Measure completeness, validity and consistency of `rows` generated for `request`
    pub fn assess_quality(&self, rows: &[Record], request: &GenerationRequest) -> QualityReport {
        quality::assess_quality(rows, request, &self.generators)
    }

    /// Delete every file under the scratch directory.
    ///
    /// Best effort: entries that cannot be read or removed are logged and
    /// skipped. Never descends into the source directory. Returns the number
    /// of files removed.
    pub fn cleanup_scratch(&self) -> usize {
        if !self.scratch_dir.is_dir() {
            debug!("No scratch directory at {}", self.scratch_dir.display());
            return 0;
        }

        let protected = self
            .source_dir
            .starts_with(&self.scratch_dir)
            .then(|| self.source_dir.clone());

        let walker = WalkDir::new(&self.scratch_dir).into_iter().filter_entry(|e| {
            protected
                .as_ref()
                .map_or(true, |source| !e.path().starts_with(source))
        });

        let mut removed = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable scratch entry: {}", e);
                    continue;
                }
            };
            let file_type = entry.file_type();
            if !file_type.is_file() && !file_type.is_symlink() {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    "Failed to delete scratch file {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }

        info!(
            "Cleaned up {} scratch file(s) in {}",
            removed,
            self.scratch_dir.display()
        );
        removed
    }

    fn ensure_scratch_dir(&self) -> Result<&Path> {
        self.scratch_ready.get_or_try_init(|| {
            fs::create_dir_all(&self.scratch_dir).map_err(|source| Error::ScratchDirectory {
                path: self.scratch_dir.clone(),
                source,
            })?;
            info!("Scratch directory ready: {}", self.scratch_dir.display());
            Ok::<(), Error>(())
        })?;
        Ok(self.scratch_dir.as_path())
    }

    fn create_scratch_file(&self, format: FixtureFormat, contents: &[u8]) -> Result<PathBuf> {
        let dir = self.ensure_scratch_dir()?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(naming::scratch_file_name(format));
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Scratch name {} already taken", path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if let Err(e) = file.write_all(contents) {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&path) {
                    warn!("Failed to remove partial file {}: {}", path.display(), remove_err);
                }
                return Err(e.into());
            }

            info!("Created scratch {} file: {}", format, path.display());
            return Ok(path);
        }

        Err(Error::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no unused scratch file name in {}", dir.display()),
        )))
    }
}

fn check_fixture_name(name: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::InvalidFixtureName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return reject("name is empty");
    }
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return reject("parent directory segments are not allowed");
    }
    if Path::new(name)
        .components()
        .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
    {
        return reject("absolute paths are not allowed");
    }
    Ok(())
}

fn read_fixture(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::FixtureNotFound {
            path: absolutize(path)?,
        }),
        Err(e) => Err(e.into()),
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Hash a file using SHA256
fn hash_file(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(tmp: &TempDir) -> FixtureDataManager {
        FixtureDataManager::new(FixtureSettings {
            source_dir: tmp.path().join("testdata"),
            scratch_dir: tmp.path().join("scratch"),
            csv: CsvOptions::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_fixture_name_checks() {
        assert!(check_fixture_name("customers.csv").is_ok());
        assert!(check_fixture_name("nested/orders.json").is_ok());
        for bad in ["", "  ", "../secrets.json", "a/../../b.csv", "..\\b.csv", "/etc/passwd"] {
            assert!(
                matches!(check_fixture_name(bad), Err(Error::InvalidFixtureName { .. })),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_missing_fixture_reports_absolute_path() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        match mgr.resolve_source_path("nope.json").unwrap_err() {
            Error::FixtureNotFound { path } => {
                assert!(path.is_absolute());
                assert!(path.ends_with("testdata/nope.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scratch_dir_created_lazily() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        assert!(!mgr.scratch_dir().exists());

        mgr.write_scratch_json(&serde_json::json!({"a": 1})).unwrap();
        assert!(mgr.scratch_dir().is_dir());

        // already present: second write still succeeds
        mgr.write_scratch_json(&serde_json::json!({"a": 2})).unwrap();
    }

    #[test]
    fn test_existing_scratch_dir_is_fine() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("scratch")).unwrap();
        let mgr = manager(&tmp);
        assert!(mgr.write_scratch_json_str("[1, 2]").is_ok());
    }

    #[test]
    fn test_scratch_dir_blocked_by_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("scratch"), b"not a directory").unwrap();
        let mgr = manager(&tmp);
        let err = mgr.write_scratch_json_str("{}").unwrap_err();
        assert!(matches!(err, Error::ScratchDirectory { .. }));
    }

    #[test]
    fn test_malformed_json_not_written() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let err = mgr.write_scratch_json_str("{\"a\": }").unwrap_err();
        assert!(matches!(err, Error::InvalidDataFormat { .. }));
        assert!(!mgr.scratch_dir().exists());
    }

    #[test]
    fn test_same_source_and_scratch_rejected() {
        let tmp = TempDir::new().unwrap();
        let result = FixtureDataManager::new(FixtureSettings {
            source_dir: tmp.path().join("data"),
            scratch_dir: tmp.path().join("data"),
            csv: CsvOptions::default(),
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let err = mgr.read_json(&tmp.path().join("gone.json")).unwrap_err();
        assert!(matches!(err, Error::FixtureNotFound { .. }));
    }

    #[test]
    fn test_settings_from_config() {
        let config = TestConfig::default();
        let settings = FixtureSettings::from_config(&config);
        assert_eq!(settings, FixtureSettings::default());
    }
}
