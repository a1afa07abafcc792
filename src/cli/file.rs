//! Single-file operations (`cardfile show|write|set|delete`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use cardfile::{CardValue, Line, Rename, Settings, TranscodeError, WriteOptions};
use clap::Args;

use crate::cli::common::{FileKindArg, parse_rename};
use crate::cli::utils::{Loaded, load_card_file, write_output};

/// Options shared by every command that reads one card file.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Card file to read (`-` for stdin).
    pub file: PathBuf,
    /// Override the file kind inferred from the extension.
    #[arg(long, value_enum)]
    pub kind: Option<FileKindArg>,
    /// Replacement parameters file used to resolve tokens.
    #[arg(long)]
    pub params: Option<PathBuf>,
}

impl InputArgs {
    pub fn load(&self, settings: &Settings) -> Result<Loaded> {
        load_card_file(&self.file, self.kind, self.params.as_deref(), settings)
    }
}

/// Arguments for `cardfile show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Print the parsed lines as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `cardfile write`.
#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Output path (`-` for stdout).
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,
    /// Rename the project prefix of path values, e.g. `model=run2`.
    #[arg(long, value_parser = parse_rename)]
    pub rename: Option<Rename>,
}

/// Arguments for `cardfile set`.
#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Card name.
    pub card: String,
    /// New value; empty turns the card into a flag.
    pub value: String,
    /// Wrap the value in double quotes.
    #[arg(long, conflicts_with = "reference")]
    pub quote: bool,
    /// Treat the value as a replacement target name (needs `--params`).
    #[arg(long, requires = "params")]
    pub reference: bool,
    /// Output path (defaults to rewriting the input file).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `cardfile delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Card name.
    pub card: String,
    /// Output path (defaults to rewriting the input file).
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn show(args: ShowArgs, settings: &Settings) -> Result<()> {
    let loaded = args.input.load(settings)?;
    if args.json {
        let json = serde_json::to_string_pretty(loaded.file.lines())
            .context("failed to encode cards as JSON")?;
        println!("{json}");
        return Ok(());
    }
    println!(
        "{} ({}): {} cards, {} warnings",
        loaded.file.filename(),
        loaded.file.kind,
        loaded.file.len(),
        loaded.warnings.len()
    );
    for (idx, line) in loaded.file.lines().iter().enumerate() {
        let Line::Card(card) = line else {
            continue;
        };
        let value = match &card.value {
            None => String::new(),
            Some(CardValue::Literal(text)) => text.clone(),
            Some(CardValue::Reference(id)) => {
                let name = loaded
                    .targets
                    .as_ref()
                    .and_then(|t| t.by_id(*id))
                    .map(|t| t.name.as_str())
                    .unwrap_or("?");
                format!("-> {name} (id {id})")
            }
        };
        println!("{:>4}  {:<24} {}", idx + 1, card.name, value);
    }
    Ok(())
}

pub fn write(args: WriteArgs, settings: &Settings) -> Result<()> {
    let loaded = args.input.load(settings)?;
    let out = loaded.file.serialize(
        &loaded.dialect,
        &WriteOptions {
            targets: loaded.targets.as_ref(),
            rename: args.rename.as_ref(),
        },
    );
    write_output(&args.output, &out.text)
}

pub fn set(args: SetArgs, settings: &Settings) -> Result<()> {
    let mut loaded = args.input.load(settings)?;
    let mode = if args.reference {
        SetMode::Reference
    } else if args.quote {
        SetMode::Quoted
    } else {
        SetMode::Plain
    };
    apply_set(&mut loaded, &args.card, &args.value, mode)?;
    save(&loaded, &args.input.file, args.output)
}

/// How `cardfile set` reads its value argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetMode {
    Plain,
    Quoted,
    Reference,
}

fn apply_set(loaded: &mut Loaded, card: &str, value: &str, mode: SetMode) -> Result<()> {
    match mode {
        SetMode::Reference => {
            let table = loaded
                .targets
                .as_ref()
                .ok_or_else(|| anyhow!("--reference needs --params"))?;
            loaded
                .file
                .set_reference(&loaded.dialect, card, value, table)?;
        }
        SetMode::Quoted => {
            loaded
                .file
                .set_card(&loaded.dialect, card, &format!("\"{value}\""))?;
        }
        SetMode::Plain => loaded.file.set_card(&loaded.dialect, card, value)?,
    }
    Ok(())
}

pub fn delete(args: DeleteArgs, settings: &Settings) -> Result<()> {
    let mut loaded = args.input.load(settings)?;
    loaded
        .file
        .delete_card(&args.card)
        .ok_or_else(|| TranscodeError::CardNotFound(args.card.clone()))?;
    save(&loaded, &args.input.file, args.output)
}

fn save(loaded: &Loaded, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let out = loaded.file.serialize(
        &loaded.dialect,
        &WriteOptions {
            targets: loaded.targets.as_ref(),
            rename: None,
        },
    );
    let target = output.unwrap_or_else(|| input.to_path_buf());
    write_output(&target, &out.text)
}
