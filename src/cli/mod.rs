//! Command-line interface wiring for the `cardfile` binary.
//!
//! This module owns the clap definitions and delegates execution to the
//! submodules that implement each command family.

use std::path::PathBuf;

use anyhow::Result;
use cardfile::Settings;
use clap::{Parser, Subcommand};

pub mod common;
pub mod file;
pub mod params;
pub mod project;
pub mod utils;
pub mod verify;

/// Parsed CLI entrypoint for the `cardfile` binary.
#[derive(Parser, Debug)]
#[command(
    name = "cardfile",
    version,
    about = "Read, edit and write card-based model files with replacement parameters"
)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON settings file with extension overrides and extra count cards.
    #[arg(long, env = "CARDFILE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a card file and list its cards.
    Show(file::ShowArgs),
    /// Parse a card file and write it back out.
    Write(file::WriteArgs),
    /// Assign a card value, appending the card if needed.
    Set(file::SetArgs),
    /// Remove a card.
    Delete(file::DeleteArgs),
    /// Check that a file survives a read/write round trip.
    Verify(verify::VerifyArgs),
    /// List the targets of a replacement parameters file.
    Params(params::ParamsArgs),
    /// Whole-project operations backed by a store.
    #[command(subcommand)]
    Project(project::ProjectCommand),
}

/// Execute the requested command.
pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Command::Show(args) => file::show(args, &settings),
        Command::Write(args) => file::write(args, &settings),
        Command::Set(args) => file::set(args, &settings),
        Command::Delete(args) => file::delete(args, &settings),
        Command::Verify(args) => verify::handle(args, &settings),
        Command::Params(args) => params::handle(args),
        Command::Project(cmd) => project::handle(cmd, settings),
    }
}
