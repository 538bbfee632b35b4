//! Synthetic record generation
//!
//! Each field of a [`GenerationRequest`] names a generator kind looked up in
//! a [`GeneratorRegistry`]. Values are nulled at `null_rate`; the values that
//! survive are swapped for the generator's invalid sentinel at
//! `invalid_rate`. A seeded request always yields identical output.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use pipetest_common::{Error, GenerationRequest, Record, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, info};

/// A named source of synthetic field values
pub trait FieldGenerator: Send + Sync {
    /// Produce one valid value
    fn generate(&self, rng: &mut StdRng) -> Value;

    /// The sentinel injected when a value should be invalid
    fn invalid_value(&self) -> Value;

    /// Whether `value` is acceptable for this field.
    ///
    /// String encodings of numbers and booleans are accepted so that rows
    /// read back from CSV can be checked too.
    fn is_valid(&self, value: &Value) -> bool;
}

/// Generator kinds by name
pub struct GeneratorRegistry {
    generators: HashMap<String, Box<dyn FieldGenerator>>,
}

impl GeneratorRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    /// A registry with every built-in kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("email", Email);
        registry.register("first-name", Pick { items: FIRST_NAMES });
        registry.register("last-name", Pick { items: LAST_NAMES });
        registry.register("city", Pick { items: CITIES });
        registry.register("country", Country);
        registry.register("integer-range", IntegerRange::new(0, 1000));
        registry.register(
            "decimal",
            Decimal {
                min: 0.0,
                max: 10_000.0,
            },
        );
        registry.register("boolean", Boolean);
        registry.register("date", Date::new(2000, 2030));
        registry.register("uuid", UuidGen);
        registry.register("customer-id", CustomerId);
        registry
    }

    /// Register (or replace) a generator under `kind`
    pub fn register(&mut self, kind: impl Into<String>, generator: impl FieldGenerator + 'static) {
        self.generators.insert(kind.into(), Box::new(generator));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn FieldGenerator> {
        self.generators.get(kind).map(|g| g.as_ref())
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.generators.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Produce the records described by `request`
pub fn generate_records(
    request: &GenerationRequest,
    registry: &GeneratorRegistry,
) -> Result<Vec<Record>> {
    if request.count == 0 {
        return Err(Error::EmptyDataset(
            "synthetic generation needs a record count of at least 1".to_string(),
        ));
    }
    check_rate("null_rate", request.null_rate)?;
    check_rate("invalid_rate", request.invalid_rate)?;
    if request.fields.is_empty() {
        return Err(Error::InvalidRequest("no fields requested".to_string()));
    }

    let mut generators = Vec::with_capacity(request.fields.len());
    for (i, field) in request.fields.iter().enumerate() {
        if request.fields[..i].iter().any(|f| f.name == field.name) {
            return Err(Error::InvalidRequest(format!(
                "field '{}' requested more than once",
                field.name
            )));
        }
        let generator = registry
            .get(&field.kind)
            .ok_or_else(|| Error::UnknownGenerator {
                field: field.name.clone(),
                kind: field.kind.clone(),
            })?;
        generators.push((field.name.as_str(), generator));
    }

    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "Generating {} synthetic record(s) with {:.1}% null and {:.1}% invalid values",
        request.count,
        request.null_rate * 100.0,
        request.invalid_rate * 100.0
    );

    let mut rows = Vec::with_capacity(request.count);
    for _ in 0..request.count {
        let mut row = Record::new();
        for (name, generator) in &generators {
            let value = if rng.gen_bool(request.null_rate) {
                Value::Null
            } else if rng.gen_bool(request.invalid_rate) {
                generator.invalid_value()
            } else {
                generator.generate(&mut rng)
            };
            row.insert(name.to_string(), value);
        }
        rows.push(row);
    }

    debug!("Generated {} record(s) of {} field(s)", rows.len(), generators.len());
    Ok(rows)
}

fn check_rate(name: &str, rate: f64) -> Result<()> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!(
            "{} must be within 0.0..=1.0, got {}",
            name, rate
        )))
    }
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "John",
    "Katherine", "Linus", "Margaret", "Niklaus", "Radia", "Tim", "Vint",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Berners-Lee", "Cerf", "Dijkstra", "Hamilton", "Hopper", "Johnson", "Knuth",
    "Liskov", "Lovelace", "McCarthy", "Perlman", "Shannon", "Torvalds", "Turing", "Wirth",
];

const CITIES: &[&str] = &[
    "Amsterdam", "Austin", "Bangalore", "Berlin", "Chicago", "Dublin", "Lisbon", "London",
    "Madrid", "New York", "Paris", "San Francisco", "Singapore", "Sydney", "Tokyo", "Toronto",
];

const COUNTRIES: &[&str] = &[
    "AU", "CA", "DE", "ES", "FR", "GB", "IE", "IN", "JP", "NL", "PT", "SG", "US",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "test.io"];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Picks one entry of a fixed word list; only list entries are valid
pub struct Pick {
    items: &'static [&'static str],
}

impl Pick {
    /// Fails on an empty list, which has nothing to pick
    pub fn new(items: &'static [&'static str]) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::InvalidRequest(
                "a word-list generator needs at least one entry".to_string(),
            ));
        }
        Ok(Self { items })
    }
}

impl FieldGenerator for Pick {
    fn generate(&self, rng: &mut StdRng) -> Value {
        Value::from(pick(rng, self.items))
    }

    fn invalid_value(&self) -> Value {
        Value::from("N/A")
    }

    fn is_valid(&self, value: &Value) -> bool {
        value
            .as_str()
            .map(|s| self.items.contains(&s))
            .unwrap_or(false)
    }
}

pub struct Email;

impl FieldGenerator for Email {
    fn generate(&self, rng: &mut StdRng) -> Value {
        let first = pick(rng, FIRST_NAMES).to_ascii_lowercase();
        let last = pick(rng, LAST_NAMES).to_ascii_lowercase();
        let n: u16 = rng.gen_range(1..1000);
        let domain = pick(rng, EMAIL_DOMAINS);
        Value::from(format!("{}.{}{}@{}", first, last, n, domain))
    }

    fn invalid_value(&self) -> Value {
        Value::from("not-an-email")
    }

    fn is_valid(&self, value: &Value) -> bool {
        let Some(s) = value.as_str() else {
            return false;
        };
        match s.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        }
    }
}

/// ISO 3166 alpha-2 country codes
pub struct Country;

impl FieldGenerator for Country {
    fn generate(&self, rng: &mut StdRng) -> Value {
        Value::from(pick(rng, COUNTRIES))
    }

    fn invalid_value(&self) -> Value {
        Value::from("ZZZ")
    }

    fn is_valid(&self, value: &Value) -> bool {
        value
            .as_str()
            .map(|s| s.len() == 2 && s.bytes().all(|b| b.is_ascii_uppercase()))
            .unwrap_or(false)
    }
}

/// Integers within an inclusive range
pub struct IntegerRange {
    min: i64,
    max: i64,
}

impl IntegerRange {
    /// Bounds are swapped if given in reverse
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }
}

impl FieldGenerator for IntegerRange {
    fn generate(&self, rng: &mut StdRng) -> Value {
        Value::from(rng.gen_range(self.min..=self.max))
    }

    fn invalid_value(&self) -> Value {
        self.min
            .checked_sub(1)
            .or_else(|| self.max.checked_add(1))
            .map(Value::from)
            .unwrap_or_else(|| Value::from("not-a-number"))
    }

    fn is_valid(&self, value: &Value) -> bool {
        lenient_i64(value)
            .map(|n| (self.min..=self.max).contains(&n))
            .unwrap_or(false)
    }
}

/// Two-decimal numbers within a half-open range
pub struct Decimal {
    min: f64,
    max: f64,
}

impl Decimal {
    /// Bounds are swapped if given in reverse; they and their span must be finite
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || !(max - min).is_finite() {
            return Err(Error::InvalidRequest(format!(
                "decimal bounds must be finite with a finite span, got {}..{}",
                min, max
            )));
        }
        Ok(Self {
            min: min.min(max),
            max: min.max(max),
        })
    }
}

impl FieldGenerator for Decimal {
    fn generate(&self, rng: &mut StdRng) -> Value {
        if self.min == self.max {
            return Value::from(self.min);
        }
        let raw: f64 = rng.gen_range(self.min..self.max);
        Value::from((raw * 100.0).round() / 100.0)
    }

    fn invalid_value(&self) -> Value {
        Value::from("not-a-number")
    }

    fn is_valid(&self, value: &Value) -> bool {
        lenient_f64(value)
            .map(|n| n.is_finite() && n >= self.min && n <= self.max)
            .unwrap_or(false)
    }
}

pub struct Boolean;

impl FieldGenerator for Boolean {
    fn generate(&self, rng: &mut StdRng) -> Value {
        Value::from(rng.gen_bool(0.5))
    }

    fn invalid_value(&self) -> Value {
        Value::from("maybe")
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Bool(_) => true,
            Value::String(s) => s == "true" || s == "false",
            _ => false,
        }
    }
}

/// ISO-8601 calendar dates between two years, inclusive
pub struct Date {
    first_year: i32,
    last_year: i32,
}

impl Date {
    pub fn new(first_year: i32, last_year: i32) -> Self {
        Self {
            first_year: first_year.min(last_year),
            last_year: first_year.max(last_year),
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

impl FieldGenerator for Date {
    fn generate(&self, rng: &mut StdRng) -> Value {
        let year = rng.gen_range(self.first_year..=self.last_year);
        let month = rng.gen_range(1..=12);
        let day = rng.gen_range(1..=days_in_month(year, month));
        Value::from(format!("{:04}-{:02}-{:02}", year, month, day))
    }

    fn invalid_value(&self) -> Value {
        Value::from("2023-02-30")
    }

    fn is_valid(&self, value: &Value) -> bool {
        value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(|date| (self.first_year..=self.last_year).contains(&date.year()))
            .unwrap_or(false)
    }
}

/// Random (version 4) UUIDs drawn from the seeded generator
pub struct UuidGen;

impl FieldGenerator for UuidGen {
    fn generate(&self, rng: &mut StdRng) -> Value {
        let bytes: [u8; 16] = rng.gen();
        Value::from(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
    }

    fn invalid_value(&self) -> Value {
        Value::from("not-a-uuid")
    }

    fn is_valid(&self, value: &Value) -> bool {
        value
            .as_str()
            .map(|s| uuid::Uuid::parse_str(s).is_ok())
            .unwrap_or(false)
    }
}

/// Customer identifiers of the form `CUST-000123`
pub struct CustomerId;

impl FieldGenerator for CustomerId {
    fn generate(&self, rng: &mut StdRng) -> Value {
        Value::from(format!("CUST-{:06}", rng.gen_range(1..=999_999u32)))
    }

    fn invalid_value(&self) -> Value {
        Value::from("CUST-??????")
    }

    fn is_valid(&self, value: &Value) -> bool {
        value
            .as_str()
            .and_then(|s| s.strip_prefix("CUST-"))
            .map(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipetest_common::FieldSpec;

    fn every_kind(registry: &GeneratorRegistry) -> GenerationRequest {
        let fields = registry
            .kinds()
            .into_iter()
            .map(|kind| FieldSpec::new(kind, kind))
            .collect();
        GenerationRequest::new(200, fields).with_seed(7)
    }

    #[test]
    fn test_generated_values_are_valid() {
        let registry = GeneratorRegistry::with_defaults();
        let rows = generate_records(&every_kind(&registry), &registry).unwrap();

        for row in &rows {
            for (kind, value) in row {
                let generator = registry.get(kind).unwrap();
                assert!(generator.is_valid(value), "{} produced {}", kind, value);
            }
        }
    }

    #[test]
    fn test_invalid_sentinels_are_invalid() {
        let registry = GeneratorRegistry::with_defaults();
        for kind in registry.kinds() {
            let generator = registry.get(kind).unwrap();
            assert!(!generator.is_valid(&generator.invalid_value()), "{}", kind);
            assert!(!generator.is_valid(&Value::Null), "{}", kind);
        }
    }

    #[test]
    fn test_invalid_rate_one_yields_sentinels() {
        let registry = GeneratorRegistry::with_defaults();
        let request = every_kind(&registry).with_invalid_rate(1.0);
        let rows = generate_records(&request, &registry).unwrap();
        for row in &rows {
            for (kind, value) in row {
                assert_eq!(value, &registry.get(kind).unwrap().invalid_value());
            }
        }
    }

    #[test]
    fn test_null_takes_precedence_over_invalid() {
        let registry = GeneratorRegistry::with_defaults();
        let request = every_kind(&registry)
            .with_null_rate(1.0)
            .with_invalid_rate(1.0);
        let rows = generate_records(&request, &registry).unwrap();
        assert!(rows.iter().flat_map(|r| r.values()).all(Value::is_null));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let registry = GeneratorRegistry::with_defaults();
        let request = GenerationRequest::new(
            3,
            vec![
                FieldSpec::new("email", "email"),
                FieldSpec::new("iban", "iban"),
            ],
        );
        match generate_records(&request, &registry).unwrap_err() {
            Error::UnknownGenerator { field, kind } => {
                assert_eq!(field, "iban");
                assert_eq!(kind, "iban");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_request_validation() {
        let registry = GeneratorRegistry::with_defaults();
        let fields = vec![FieldSpec::new("age", "integer-range")];

        let zero = GenerationRequest::new(0, fields.clone());
        assert!(matches!(
            generate_records(&zero, &registry),
            Err(Error::EmptyDataset(_))
        ));

        for rate in [-0.1, 1.5, f64::NAN] {
            let bad = GenerationRequest::new(1, fields.clone()).with_null_rate(rate);
            assert!(matches!(
                generate_records(&bad, &registry),
                Err(Error::InvalidRequest(_))
            ));
        }

        let duplicate = GenerationRequest::new(1, vec![fields[0].clone(), fields[0].clone()]);
        assert!(matches!(
            generate_records(&duplicate, &registry),
            Err(Error::InvalidRequest(_))
        ));

        let no_fields = GenerationRequest::new(1, vec![]);
        assert!(matches!(
            generate_records(&no_fields, &registry),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_custom_generator_registration() {
        let mut registry = GeneratorRegistry::empty();
        registry.register("adult-age", IntegerRange::new(65, 18));
        let request =
            GenerationRequest::new(100, vec![FieldSpec::new("age", "adult-age")]).with_seed(1);
        let rows = generate_records(&request, &registry).unwrap();
        for row in rows {
            let age = row["age"].as_i64().unwrap();
            assert!((18..=65).contains(&age));
        }
        assert_eq!(registry.get("adult-age").unwrap().invalid_value(), Value::from(17));
    }

    #[test]
    fn test_lenient_string_values() {
        assert!(IntegerRange::new(0, 10).is_valid(&Value::from("7")));
        assert!(!IntegerRange::new(0, 10).is_valid(&Value::from("11")));
        assert!(Boolean.is_valid(&Value::from("true")));
        assert!(Decimal::new(0.0, 1.0).unwrap().is_valid(&Value::from("0.25")));
        assert!(Date::new(2000, 2030).is_valid(&Value::from("2024-02-29")));
        assert!(!Date::new(2000, 2030).is_valid(&Value::from("2023-02-29")));
    }

    #[test]
    fn test_dates_outside_year_bounds_are_invalid() {
        let date = Date::new(2000, 2030);
        assert!(date.is_valid(&Value::from("2000-01-01")));
        assert!(date.is_valid(&Value::from("2030-12-31")));
        assert!(!date.is_valid(&Value::from("1999-12-31")));
        assert!(!date.is_valid(&Value::from("2031-01-01")));
    }

    #[test]
    fn test_unusable_constructor_arguments_rejected() {
        assert!(matches!(Pick::new(&[]), Err(Error::InvalidRequest(_))));
        assert!(Pick::new(&["only"]).is_ok());

        for (min, max) in [
            (f64::NAN, 1.0),
            (0.0, f64::INFINITY),
            (f64::NEG_INFINITY, 0.0),
            (f64::MIN, f64::MAX),
        ] {
            assert!(
                matches!(Decimal::new(min, max), Err(Error::InvalidRequest(_))),
                "{}..{}",
                min,
                max
            );
        }

        let mut rng = StdRng::seed_from_u64(5);
        let reversed = Decimal::new(10.0, -10.0).unwrap();
        let value = reversed.generate(&mut rng).as_f64().unwrap();
        assert!((-10.0..=10.0).contains(&value));
    }
}
