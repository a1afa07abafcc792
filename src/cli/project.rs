//! Project-level operations (`cardfile project ...`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use cardfile::{CardStore, JsonlStore, Project, Settings};
use clap::{Args, Subcommand};

/// Supported `cardfile project` subcommands.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Read a project and its sub-files into a store.
    Read(ProjectReadArgs),
    /// Write a stored project back out as card files.
    Write(ProjectWriteArgs),
    /// List the files held in a store.
    Files(ProjectFilesArgs),
}

/// Arguments for `cardfile project read`.
#[derive(Args, Debug)]
pub struct ProjectReadArgs {
    /// Directory holding the project.
    pub dir: PathBuf,
    /// Project file name inside the directory, e.g. `model.prj`.
    pub project: String,
    /// JSONL store to fill; existing contents are replaced.
    #[arg(long)]
    pub store: PathBuf,
}

/// Arguments for `cardfile project write`.
#[derive(Args, Debug)]
pub struct ProjectWriteArgs {
    /// JSONL store to read.
    #[arg(long)]
    pub store: PathBuf,
    /// Output directory.
    pub dir: PathBuf,
    /// New project name; prefixed file names are renamed to match.
    pub name: Option<String>,
}

/// Arguments for `cardfile project files`.
#[derive(Args, Debug)]
pub struct ProjectFilesArgs {
    /// JSONL store to read.
    #[arg(long)]
    pub store: PathBuf,
}

/// Execute a project command.
pub fn handle(command: ProjectCommand, settings: Settings) -> Result<()> {
    match command {
        ProjectCommand::Read(args) => read(args, settings),
        ProjectCommand::Write(args) => write(args, settings),
        ProjectCommand::Files(args) => files(args),
    }
}

fn read(args: ProjectReadArgs, settings: Settings) -> Result<()> {
    let parsed = Project::read(&args.dir, &args.project, settings)?;
    let mut store = JsonlStore::open(&args.store)
        .with_context(|| format!("failed to open store {}", args.store.display()))?;
    let ids = parsed.value.save(&mut store)?;
    println!(
        "Stored {} files of project {} in {} ({} warnings)",
        ids.len(),
        parsed.value.name,
        store.path().display(),
        parsed.warnings.len()
    );
    Ok(())
}

fn write(args: ProjectWriteArgs, settings: Settings) -> Result<()> {
    let store = JsonlStore::load(&args.store)
        .with_context(|| format!("failed to read store {}", args.store.display()))?;
    let project = Project::load(&store, settings)?;
    let warnings = project.write(&args.dir, args.name.as_deref())?;
    println!(
        "Wrote project {} to {} ({} warnings)",
        args.name.as_deref().unwrap_or(&project.name),
        args.dir.display(),
        warnings.len()
    );
    Ok(())
}

fn files(args: ProjectFilesArgs) -> Result<()> {
    let store = JsonlStore::load(&args.store)
        .with_context(|| format!("failed to read store {}", args.store.display()))?;
    if let Some(project) = &store.meta().project {
        println!("project {}", project.name);
    }
    for record in store.files() {
        println!(
            "{:>4}  {:<32} {:<16} {}  {}",
            record.id,
            record.filename(),
            record.kind.to_string(),
            record.updated_at.format("%Y-%m-%d %H:%M:%S"),
            &record.digest[..12.min(record.digest.len())]
        );
    }
    Ok(())
}
