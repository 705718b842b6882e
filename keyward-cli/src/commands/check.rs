//! Check command - validate a policy file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use keyward_core::{RuleSet, policy};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Policy file (JSON or TOML)
    pub file: PathBuf,

    /// Print only the rule count
    #[arg(short, long)]
    pub quiet: bool,
}

/// Read and load a policy file, naming the file in any error
pub fn read_policy(path: &Path) -> Result<RuleSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file {}", path.display()))?;
    policy::load(&raw).with_context(|| format!("Invalid policy file {}", path.display()))
}

pub fn run(args: CheckArgs) -> Result<()> {
    let rules = read_policy(&args.file)?;

    println!("{}: {} rule(s)", args.file.display(), rules.len());
    if !args.quiet {
        println!("{}", rules.to_json_pretty()?);
    }

    Ok(())
}
