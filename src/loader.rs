//! Package-loading collaborator.
//!
//! The compiler never reads or type-checks source text itself. A front-end hands it
//! packages that are already parsed: declared types with their field lists and tags,
//! functions with the comment lines attached to them, and each file's imports. This
//! module defines that contract ([`PackageLoader`]) and the package model, together
//! with two loaders:
//!
//! - [`MemoryLoader`] keeps packages in a map, for embedding and tests;
//! - [`ManifestLoader`] reads one JSON manifest per package from a directory tree,
//!   which is how an external Go front-end hands its results over.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

/// Capability to turn an import path into a loaded package.
pub trait PackageLoader {
    /// Loads a single package by import path.
    fn load(&self, import_path: &str) -> Result<Package, LoadError>;

    /// Loads several packages, returning one result per requested path, in order.
    fn load_all(&self, import_paths: &[&str]) -> Vec<Result<Package, LoadError>> {
        import_paths.iter().map(|path| self.load(path)).collect()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("package {0} not found")]
    NotFound(String),
    #[error("package {path} failed to load: {message}")]
    Broken { path: String, message: String },
}

/// A loaded package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Import path, e.g. `github.com/acme/shop/model`.
    pub path: String,
    /// Declared package name, e.g. `model`.
    pub name: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

/// One source file of a package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// File name relative to the package directory, e.g. `main.go`.
    pub name: String,
    /// Comment lines preceding the package clause.
    #[serde(default)]
    pub package_doc: Vec<String>,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub funcs: Vec<FuncDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Explicit alias, if the import statement carries one.
    #[serde(default)]
    pub alias: Option<String>,
    pub path: String,
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Type parameter names of a generic declaration, in order.
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub doc: Vec<String>,
    #[serde(flatten)]
    pub kind: TypeDeclKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDeclKind {
    /// `type T struct { ... }`
    Struct {
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    /// `type T U` where `U` is not a struct literal.
    Named { underlying: String },
    /// `type T = U`
    Alias { target: String },
    /// `type T interface { ... }`
    Interface,
}

/// One field of a struct declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name; for embedded fields this is the embedded type's name.
    pub name: String,
    /// Source spelling of the field type.
    #[serde(rename = "type")]
    pub ty: String,
    /// Raw tag string without backticks.
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub embedded: bool,
}

/// A function or method declaration with its attached comment lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    #[serde(default)]
    pub doc: Vec<String>,
    /// Line of the declaration, used in diagnostics.
    #[serde(default)]
    pub line: usize,
}

impl Package {
    /// Finds a declared type by name across the package's files.
    pub fn find_type(&self, name: &str) -> Option<(&SourceFile, &TypeDecl)> {
        self.files.iter().find_map(|file| {
            file.types
                .iter()
                .find(|decl| decl.name == name)
                .map(|decl| (file, decl))
        })
    }

    pub fn file(&self, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|file| file.name == name)
    }
}

impl SourceFile {
    /// Resolves a package qualifier used in this file to an import path.
    ///
    /// An explicit alias wins; otherwise the last path segment is compared, ignoring a
    /// trailing major-version segment (`.../v2`) the way the language resolves names.
    pub fn resolve_qualifier(&self, qualifier: &str) -> Option<&str> {
        if let Some(import) = self
            .imports
            .iter()
            .find(|import| import.alias.as_deref() == Some(qualifier))
        {
            return Some(&import.path);
        }

        self.imports
            .iter()
            .filter(|import| import.alias.is_none())
            .find(|import| default_import_name(&import.path) == qualifier)
            .map(|import| import.path.as_str())
    }
}

/// Name a package is referred to by when imported without an alias.
pub fn default_import_name(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let last = segments.next().unwrap_or(path);
    let is_major_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major_version {
        if let Some(previous) = segments.next() {
            return previous;
        }
    }
    last
}

/// In-memory loader.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    packages: HashMap<String, Package>,
    broken: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.insert(package);
        self
    }

    pub fn insert(&mut self, package: Package) {
        self.packages.insert(package.path.clone(), package);
    }

    /// Registers a package that fails to load with the given message.
    pub fn insert_broken(&mut self, path: &str, message: &str) {
        self.broken.insert(path.to_string(), message.to_string());
    }

    pub fn package_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.packages.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl PackageLoader for MemoryLoader {
    fn load(&self, import_path: &str) -> Result<Package, LoadError> {
        if let Some(message) = self.broken.get(import_path) {
            return Err(LoadError::Broken {
                path: import_path.to_string(),
                message: message.clone(),
            });
        }
        self.packages
            .get(import_path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(import_path.to_string()))
    }
}

/// Loader over a directory of JSON package manifests.
///
/// Every `*.json` file below the root (hidden directories skipped) is read as one
/// [`Package`]. Files that cannot be read or decoded are recorded as warnings and do
/// not stop the scan.
pub struct ManifestLoader {
    inner: MemoryLoader,
    warnings: Vec<String>,
}

impl ManifestLoader {
    pub fn from_dir(root: &Path) -> anyhow::Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("Manifest directory does not exist: {}", root.display());
        }

        let mut inner = MemoryLoader::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path() == root || !e.file_name().to_string_lossy().starts_with('.')
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match Self::read_manifest(path) {
                Ok(package) => {
                    debug!("Loaded manifest {} for package {}", path.display(), package.path);
                    inner.insert(package);
                }
                Err(e) => {
                    let warning = format!("Skipping manifest {}: {:#}", path.display(), e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(Self {
            inner,
            warnings,
        })
    }

    fn read_manifest(path: &Path) -> anyhow::Result<Package> {
        use anyhow::Context;

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let package: Package = serde_json::from_str(&content)
            .with_context(|| format!("Failed to decode package manifest: {}", path.display()))?;
        if package.path.is_empty() {
            anyhow::bail!("manifest has an empty package path");
        }
        Ok(package)
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Import paths of every loaded manifest, sorted.
    pub fn package_paths(&self) -> Vec<String> {
        self.inner.package_paths()
    }
}

impl PackageLoader for ManifestLoader {
    fn load(&self, import_path: &str) -> Result<Package, LoadError> {
        self.inner.load(import_path)
    }
}
