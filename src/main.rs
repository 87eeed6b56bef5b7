//! Command-line tool generating Swagger 2.0 documents from annotated source comments.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-comments [OPTIONS] --entry <PACKAGE> <MANIFEST_DIR>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! openapi-from-comments ./manifests --entry github.com/acme/shop -o swagger.yaml
//! ```
//!
//! Generate JSON documentation for selected packages:
//! ```bash
//! openapi-from-comments ./manifests --entry github.com/acme/shop \
//!     --search github.com/acme/shop/api -f json -o swagger.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_comments::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-comments starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("Swagger document generation completed successfully");

    Ok(())
}
