//! Build configuration.
//!
//! [`BuildConfig`] can be deserialized from a JSON file; every field has a default so a
//! file only needs to name what it changes. CLI flags are applied on top.

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BuildConfig {
    /// Import path of the package holding the general API annotations.
    pub entry_package: String,
    /// File inside the entry package whose package comment holds `@title`, `@version`, ...
    pub entry_file: String,
    /// Packages scanned for operation annotations. Empty means the entry package only.
    pub search_packages: Vec<String>,
    /// Tag keys consulted, in order, for a field's output name.
    pub name_tag_keys: Vec<String>,
    /// Tag key whose presence marks a field as visible in the public projection.
    pub visibility_tag: String,
    /// Suffix appended to definition names built under the public projection.
    pub public_suffix: String,
    /// Packages whose embedded types are promoted one level, or dropped when they have no fields.
    pub wrapper_packages: Vec<String>,
    /// Generic type names unwrapped into their first type argument.
    pub generic_wrappers: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry_package: String::new(),
            entry_file: "main.go".to_string(),
            search_packages: Vec::new(),
            name_tag_keys: vec!["json".to_string(), "column".to_string()],
            visibility_tag: "public".to_string(),
            public_suffix: "Public".to_string(),
            wrapper_packages: Vec::new(),
            generic_wrappers: vec!["StructField".to_string()],
        }
    }
}

impl BuildConfig {
    pub fn new(entry_package: &str) -> Self {
        Self {
            entry_package: entry_package.to_string(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: BuildConfig = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!("cannot decode {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Packages to scan for operations: the configured list, or the entry package alone.
    pub fn packages_to_scan(&self) -> Vec<String> {
        if self.search_packages.is_empty() {
            vec![self.entry_package.clone()]
        } else {
            self.search_packages.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.entry_package.trim().is_empty() {
            return Err(Error::InvalidConfig("entry package is empty".to_string()));
        }
        if self.name_tag_keys.is_empty() {
            return Err(Error::InvalidConfig("no name tag keys configured".to_string()));
        }
        if self.public_suffix.is_empty() {
            return Err(Error::InvalidConfig("public suffix is empty".to_string()));
        }
        Ok(())
    }

    pub fn is_wrapper_package(&self, path: &str) -> bool {
        self.wrapper_packages.iter().any(|p| p == path)
    }

    pub fn is_generic_wrapper(&self, name: &str) -> bool {
        self.generic_wrappers.iter().any(|n| n == name)
    }
}
