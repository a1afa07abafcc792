//! Replacement parameter listing (`cardfile params`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cardfile::{ReplacementValues, TargetKind, read_targets};
use clap::Args;

/// Arguments for `cardfile params`.
#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Replacement parameters file.
    pub file: PathBuf,
    /// Replacement values file supplying defaults.
    #[arg(long)]
    pub values: Option<PathBuf>,
    /// Print the targets as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn handle(args: ParamsArgs) -> Result<()> {
    let mut table = read_targets(&args.file)?.value;
    if let Some(path) = &args.values {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        table.apply_defaults(&ReplacementValues::parse(&text));
    }
    if args.json {
        let json = serde_json::to_string_pretty(&table)
            .context("failed to encode targets as JSON")?;
        println!("{json}");
        return Ok(());
    }
    println!("{} targets", table.len());
    for target in table.iter() {
        let kind = match target.kind {
            TargetKind::String => "string",
            TargetKind::Numeric => "numeric",
        };
        println!(
            "{:>4}  {:<24} {:<8} {:<8} {}",
            target.id,
            target.name,
            target.format,
            kind,
            target.default.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
