//! Swagger 2.0 documents from annotated source comments.
//!
//! This library compiles two kinds of input into one API description without running
//! the described program:
//!
//! - structured comments on handler functions (`@Summary`, `@Param`, `@Success`,
//!   `@Router`, ...) and on the entry file (`@title`, `@version`,
//!   `@securityDefinitions.apikey`, ...);
//! - declared struct types, read through their field tags, which become the schema
//!   definitions the operations refer to.
//!
//! Packages are supplied by a [`PackageLoader`]: an already parsed view of a code base
//! (declarations, field tags, comment lines and imports). [`ManifestLoader`] reads that
//! view from JSON manifests produced by an external front end.
//!
//! # Architecture
//!
//! 1. [`tag`] - Reads `key:"value"` field tags
//! 2. [`type_expr`] - Parses type spellings into expression trees
//! 3. [`walker`] - Walks struct declarations into field descriptor trees
//! 4. [`schema`] / [`synthesizer`] - Turns field trees into named definitions
//! 5. [`annotation`] - Parses comment attributes into operations and general info
//! 6. [`assembler`] - Merges operations and definitions into a [`SwaggerDocument`]
//! 7. [`pipeline`] - Runs the whole build ([`build_document`])
//! 8. [`serializer`] - Writes the document as YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_comments::{build_document, BuildConfig, ManifestLoader};
//! use openapi_from_comments::serializer::serialize_yaml;
//! use std::path::Path;
//!
//! let loader = ManifestLoader::from_dir(Path::new("./manifests")).unwrap();
//! let mut config = BuildConfig::new("github.com/acme/shop");
//! config.search_packages = loader.package_paths();
//!
//! let output = build_document(&loader, &config).unwrap();
//! for diagnostic in &output.diagnostics {
//!     eprintln!("warning: {}", diagnostic);
//! }
//! println!("{}", serialize_yaml(&output.document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod annotation;
pub mod assembler;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod serializer;
pub mod synthesizer;
pub mod tag;
pub mod type_expr;
pub mod walker;

pub use config::BuildConfig;
pub use document::SwaggerDocument;
pub use error::{Diagnostic, Error, Result};
pub use loader::{ManifestLoader, MemoryLoader, PackageLoader};
pub use pipeline::{build_document, BuildOutput};
