//! JSON-backed implementation registries.
//!
//! A registry maps `(category, name)` pairs to implementation locators.
//! The table is read once, at construction, from a document shaped like:
//!
//! ```json
//! {
//!     "exporters": { "abc": "alembic_exporter", "usd": "usd_exporter" },
//!     "proxies":   { "abc": "gpu_cache" }
//! }
//! ```
//!
//! Locators are resolved against a compiled-in set of implementations
//! (the `Locator` trait), so nothing is loaded dynamically.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by registry construction and lookup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed registry config {source_name}: {error}")]
    Malformed {
        source_name: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("category '{0}' isn't registered with the system")]
    UnknownCategory(String),

    #[error("'{name}' isn't registered under category '{category}'")]
    UnknownName { category: String, name: String },

    #[error("invalid implementation locator '{0}'")]
    InvalidLocator(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A compiled-in implementation that can be named from a config file.
pub trait Locator: Copy + fmt::Debug {
    /// Parse a locator string from the config table.
    fn from_locator(locator: &str) -> Option<Self>;

    /// The locator string naming this implementation.
    fn locator(self) -> &'static str;
}

/// A locator string as found in the config table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImplementationLocator(String);

impl ImplementationLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImplementationLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable `(category, name) -> locator` table.
#[derive(Debug, Clone)]
pub struct Registry<L> {
    /// Where the table came from (file path or a label)
    source: String,
    table: BTreeMap<String, BTreeMap<String, String>>,
    _kind: PhantomData<L>,
}

impl<L: Locator> Registry<L> {
    /// Read a registry table from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content, &path.to_string_lossy())
    }

    /// Parse a registry table from JSON text (useful for embedded configs and tests).
    pub fn from_json_str(content: &str, source: &str) -> RegistryResult<Self> {
        let table: BTreeMap<String, BTreeMap<String, String>> =
            serde_json::from_str(content).map_err(|error| RegistryError::Malformed {
                source_name: source.to_string(),
                error,
            })?;

        log::debug!(
            "Loaded registry {} with {} categories",
            source,
            table.len()
        );

        Ok(Self {
            source: source.to_string(),
            table,
            _kind: PhantomData,
        })
    }

    /// Where this registry was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Find the locator registered for `(category, name)`.
    pub fn resolve(&self, category: &str, name: &str) -> RegistryResult<ImplementationLocator> {
        let entries = self
            .table
            .get(category)
            .ok_or_else(|| RegistryError::UnknownCategory(category.to_string()))?;

        entries
            .get(name)
            .map(|locator| ImplementationLocator::new(locator.clone()))
            .ok_or_else(|| RegistryError::UnknownName {
                category: category.to_string(),
                name: name.to_string(),
            })
    }

    /// Map a locator onto its compiled-in implementation.
    pub fn kind(&self, locator: &ImplementationLocator) -> RegistryResult<L> {
        L::from_locator(locator.as_str())
            .ok_or_else(|| RegistryError::InvalidLocator(locator.as_str().to_string()))
    }

    /// `resolve` followed by `kind`.
    pub fn lookup(&self, category: &str, name: &str) -> RegistryResult<L> {
        let locator = self.resolve(category, name)?;
        self.kind(&locator)
    }

    /// Registered categories, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// `(name, locator)` pairs of one category, sorted by name.
    pub fn entries(&self, category: &str) -> RegistryResult<Vec<(&str, &str)>> {
        let entries = self
            .table
            .get(category)
            .ok_or_else(|| RegistryError::UnknownCategory(category.to_string()))?;
        Ok(entries
            .iter()
            .map(|(name, locator)| (name.as_str(), locator.as_str()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fruit {
        Apple,
        Pear,
    }

    impl Locator for Fruit {
        fn from_locator(locator: &str) -> Option<Self> {
            match locator {
                "apple" => Some(Fruit::Apple),
                "pear" => Some(Fruit::Pear),
                _ => None,
            }
        }

        fn locator(self) -> &'static str {
            match self {
                Fruit::Apple => "apple",
                Fruit::Pear => "pear",
            }
        }
    }

    const TABLE: &str = r#"{
        "trees": { "a": "apple", "p": "pear", "q": "quince" },
        "bushes": {}
    }"#;

    #[test]
    fn test_resolve_registered_entry() {
        let registry: Registry<Fruit> = Registry::from_json_str(TABLE, "test").unwrap();
        let locator = registry.resolve("trees", "a").unwrap();
        assert_eq!(locator.as_str(), "apple");
        assert_eq!(registry.kind(&locator).unwrap(), Fruit::Apple);
        assert_eq!(registry.lookup("trees", "p").unwrap(), Fruit::Pear);
    }

    #[test]
    fn test_unregistered_pairs_fail() {
        let registry: Registry<Fruit> = Registry::from_json_str(TABLE, "test").unwrap();

        for (category, name) in [("roots", "a"), ("trees", "x"), ("bushes", "a"), ("", "")] {
            let err = registry.resolve(category, name).unwrap_err();
            assert!(matches!(
                err,
                RegistryError::UnknownCategory(_) | RegistryError::UnknownName { .. }
            ));
        }
    }

    #[test]
    fn test_invalid_locator_fails_on_kind() {
        let registry: Registry<Fruit> = Registry::from_json_str(TABLE, "test").unwrap();
        let locator = registry.resolve("trees", "q").unwrap();
        assert!(matches!(
            registry.kind(&locator),
            Err(RegistryError::InvalidLocator(name)) if name == "quince"
        ));
    }

    #[test]
    fn test_malformed_config_fails_fast() {
        for bad in ["", "[]", r#"{"trees": ["apple"]}"#, r#"{"trees": {"a": 1}}"#] {
            let result = Registry::<Fruit>::from_json_str(bad, "bad");
            assert!(matches!(result, Err(RegistryError::Malformed { .. })), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fruit.json");
        std::fs::write(&path, TABLE).unwrap();

        let registry: Registry<Fruit> = Registry::load(&path).unwrap();
        assert_eq!(registry.categories().collect::<Vec<_>>(), vec!["bushes", "trees"]);
        assert_eq!(registry.entries("trees").unwrap().len(), 3);

        let missing = Registry::<Fruit>::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(RegistryError::Io { .. })));
    }
}
