use crate::config::BuildConfig;
use crate::loader::ManifestLoader;
use crate::pipeline::build_document;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Generate a Swagger 2.0 document from annotated source comments and type declarations
#[derive(Parser, Debug)]
#[command(name = "openapi-from-comments")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Directory of package manifests (one JSON file per package)
    #[arg(value_name = "MANIFEST_DIR")]
    pub manifest_dir: PathBuf,

    /// Import path of the package holding the general API annotations
    #[arg(short = 'e', long = "entry", value_name = "PACKAGE")]
    pub entry: Option<String>,

    /// File of the entry package holding the general API annotations
    #[arg(long = "entry-file", value_name = "FILE")]
    pub entry_file: Option<String>,

    /// Package to scan for operations; repeat for several. Defaults to every package found
    #[arg(short = 's', long = "search", value_name = "PACKAGE")]
    pub search: Vec<String>,

    /// Package whose embedded types are promoted or dropped as tag-only markers
    #[arg(long = "wrapper-package", value_name = "PACKAGE")]
    pub wrapper_packages: Vec<String>,

    /// JSON configuration file; flags override its values
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Exit with an error when the build produced diagnostics
    #[arg(long = "strict")]
    pub strict: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.manifest_dir.exists() {
        anyhow::bail!(
            "Manifest directory does not exist: {}",
            args.manifest_dir.display()
        );
    }
    if !args.manifest_dir.is_dir() {
        anyhow::bail!(
            "Manifest path is not a directory: {}",
            args.manifest_dir.display()
        );
    }

    info!("Manifest directory: {}", args.manifest_dir.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Merges the configuration file (if any) with the command-line flags.
pub fn resolve_config(args: &CliArgs) -> Result<BuildConfig> {
    let mut config = match &args.config {
        Some(path) => BuildConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => BuildConfig::default(),
    };

    if let Some(entry) = &args.entry {
        config.entry_package = entry.clone();
    }
    if let Some(entry_file) = &args.entry_file {
        config.entry_file = entry_file.clone();
    }
    if !args.search.is_empty() {
        config.search_packages = args.search.clone();
    }
    config.wrapper_packages.extend(args.wrapper_packages.iter().cloned());

    if config.entry_package.is_empty() {
        anyhow::bail!("No entry package given; use --entry or set entry_package in the configuration");
    }
    Ok(config)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting Swagger document generation...");
    let mut config = resolve_config(&args)?;

    info!("Loading package manifests...");
    let loader = ManifestLoader::from_dir(&args.manifest_dir)?;
    for warning in loader.warnings() {
        warn!("{}", warning);
    }
    info!("Loaded {} packages", loader.package_paths().len());

    if config.search_packages.is_empty() {
        config.search_packages = loader.package_paths();
        debug!("Scanning every loaded package: {:?}", config.search_packages);
    }

    info!("Building document...");
    let output = build_document(&loader, &config)
        .with_context(|| format!("Failed to build document for {}", config.entry_package))?;

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&output.document)?,
        OutputFormat::Json => serialize_json(&output.document)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Packages scanned: {}", config.search_packages.len());
    info!("  - Operations: {}", output.document.operation_count());
    info!("  - Definitions: {}", output.document.definitions.len());
    info!("  - Diagnostics: {}", output.diagnostics.len());

    if args.strict && !output.diagnostics.is_empty() {
        anyhow::bail!(
            "{} diagnostics reported in strict mode",
            output.diagnostics.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(dir: &std::path::Path, extra: &[&str]) -> CliArgs {
        let mut argv = vec!["openapi-from-comments", dir.to_str().unwrap()];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{"entry_package": "example.com/a", "entry_file": "api.go"}"#,
        )
        .unwrap();

        let args = args(
            temp_dir.path(),
            &[
                "--config",
                config_path.to_str().unwrap(),
                "--entry",
                "example.com/b",
                "--search",
                "example.com/b/api",
            ],
        );
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.entry_package, "example.com/b");
        assert_eq!(config.entry_file, "api.go");
        assert_eq!(config.search_packages, vec!["example.com/b/api"]);
    }

    #[test]
    fn test_entry_is_required() {
        let temp_dir = TempDir::new().unwrap();
        let args = args(temp_dir.path(), &[]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_manifest_dir_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let args = args(&missing, &["--entry", "example.com/a"]);
        assert!(parse_args_from_parsed(args).is_err());
    }
}
