//! `bom-license-policy` — resolve SBOM license declarations against a license
//! policy and report the verdicts.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Install the `tracing` subscriber (stderr, `RUST_LOG` or `--verbose`).
//! 3. Load the policy config ([`load_config`]) and build its index once.
//! 4. `check`: resolve every declaration and render the results.
//!    `policies`: list the indexed policies.
//! 5. Exit `0`, or `1` when `check` found at least one `deny`.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bom_license_policy::config::load_config;
use bom_license_policy::error::ConfigError;
use bom_license_policy::models::{LicenseDeclaration, LicensePolicy, UsagePolicy};
use bom_license_policy::report;
use cli::{CheckArgs, Cli, Command, OutputFormat, PoliciesArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load policy config; an unusable policy set stops the run
    let cwd = std::env::current_dir()?;
    let mut config = load_config(&cwd, cli.config.as_deref())?;
    if cli.strict {
        config = config.with_strict(true);
    }
    let resolver = config.resolver().map_err(ConfigError::from)?;

    match cli.command {
        Command::Check(args) => {
            let decls = collect_declarations(&args)?;
            if decls.is_empty() {
                eprintln!("No license declarations given (use --id, --name, --expression or --input)");
                std::process::exit(2);
            }

            let results = resolver.resolve_all(&decls);
            match cli.format {
                OutputFormat::Terminal => {
                    report::terminal::render_resolutions(&results, cli.verbose, cli.quiet);
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
            }

            let has_denied = results
                .iter()
                .any(|r| r.usage_policy == UsagePolicy::Deny);
            if has_denied {
                std::process::exit(1);
            }
        }
        Command::Policies(args) => {
            let policies = select_policies(resolver.index().policies(), &args);
            match cli.format {
                OutputFormat::Terminal => report::terminal::render_policies(&config, &policies),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&policies)?),
            }
        }
    }

    Ok(())
}

/// Gather declarations from flags first, then from `--input`, in order.
fn collect_declarations(args: &CheckArgs) -> Result<Vec<LicenseDeclaration>> {
    let mut decls: Vec<LicenseDeclaration> = Vec::new();
    decls.extend(
        args.ids
            .iter()
            .filter_map(|id| LicenseDeclaration::from_fields(Some(id.as_str()), None, None)),
    );
    decls.extend(
        args.names
            .iter()
            .filter_map(|name| LicenseDeclaration::from_fields(None, Some(name.as_str()), None)),
    );
    decls.extend(
        args.expressions
            .iter()
            .filter_map(|expr| LicenseDeclaration::from_fields(None, None, Some(expr.as_str()))),
    );

    if let Some(path) = &args.input {
        decls.extend(read_declarations(path)?);
    }
    Ok(decls)
}

fn read_declarations(path: &Path) -> Result<Vec<LicenseDeclaration>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read license input {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of license choices", path.display()))
}

fn select_policies<'a>(
    policies: Vec<&'a LicensePolicy>,
    args: &PoliciesArgs,
) -> Vec<&'a LicensePolicy> {
    let usage = args.usage.map(UsagePolicy::from);
    policies
        .into_iter()
        .filter(|p| usage.map_or(true, |u| p.usage_policy == u))
        .filter(|p| args.family.as_deref().map_or(true, |f| p.family == f))
        .collect()
}
