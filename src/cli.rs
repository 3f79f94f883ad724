use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bom_license_policy::models::UsagePolicy;

#[derive(Parser, Debug)]
#[command(
    name = "bom-license-policy",
    about = "Resolve SBOM license declarations to usage policies",
    version
)]
pub struct Cli {
    /// Policy config file (JSON, or TOML by extension) [default: ./.bom-license-policy/policy.json, fallback ~/.config/bom-license-policy/policy.json, then the built-in policy]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Reject invalid policy entries and family usage mismatches
    #[arg(long, global = true)]
    pub strict: bool,

    /// Output format
    #[arg(long, default_value = "terminal", value_name = "FORMAT", global = true)]
    pub format: OutputFormat,

    /// Show all rows and debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve license declarations to usage policies
    Check(CheckArgs),
    /// List the indexed license policies
    Policies(PoliciesArgs),
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// SPDX license id (repeatable)
    #[arg(long = "id", value_name = "SPDX_ID")]
    pub ids: Vec<String>,

    /// Free-text license name (repeatable)
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// SPDX license expression (repeatable)
    #[arg(long = "expression", value_name = "EXPR")]
    pub expressions: Vec<String>,

    /// JSON file holding an array of CycloneDX license choices
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct PoliciesArgs {
    /// Only list policies with this usage policy
    #[arg(long, value_name = "POLICY")]
    pub usage: Option<UsageArg>,

    /// Only list policies of this family
    #[arg(long, value_name = "NAME")]
    pub family: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum UsageArg {
    Allow,
    Deny,
    NeedsReview,
}

impl From<UsageArg> for UsagePolicy {
    fn from(arg: UsageArg) -> Self {
        match arg {
            UsageArg::Allow => UsagePolicy::Allow,
            UsageArg::Deny => UsagePolicy::Deny,
            UsageArg::NeedsReview => UsagePolicy::NeedsReview,
        }
    }
}
