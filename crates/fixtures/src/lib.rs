//! pipetest fixture manager
//!
//! This crate manages the structured data that drives end-to-end pipeline
//! scenarios:
//! - Resolves pre-authored fixtures in a read-only source directory
//! - Writes generated JSON/CSV fixtures into a scratch directory with
//!   collision-free names
//! - Parses fixtures back and checks JSON syntax and CSV shape
//! - Generates seeded synthetic record sets with null/invalid injection
//! - Purges the scratch directory on demand
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FixtureDataManager                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │    ├── resolve_source_path(name) -> PathBuf                 │
//! │    ├── write_scratch_json(content) -> PathBuf               │
//! │    ├── write_scratch_csv(rows) -> PathBuf                   │
//! │    ├── read_json(path) / read_csv(path)                     │
//! │    ├── validate_json_syntax / validate_csv_shape            │
//! │    ├── generate_synthetic_records(request) -> rows          │
//! │    └── cleanup_scratch() -> count                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  naming      unique scratch file names                      │
//! │  csv_codec   header-driven CSV encode/decode                │
//! │  validate    advisory syntax/shape checks                   │
//! │  generate    GeneratorRegistry + FieldGenerator kinds       │
//! │  quality     completeness/validity/consistency scoring      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod csv_codec;
pub mod generate;
pub mod manager;
pub mod naming;
pub mod quality;
pub mod validate;

pub use generate::{FieldGenerator, GeneratorRegistry, IntegerRange};
pub use manager::{FixtureDataManager, FixtureSettings};
pub use quality::QualityReport;
pub use validate::{validate_csv_shape, validate_json_syntax};
