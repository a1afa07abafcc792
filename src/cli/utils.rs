//! Convenience helpers shared across command handlers.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cardfile::{
    CardDialect, CardFile, ConfiguredDialect, ParseOptions, ReplacementTable, Settings,
    TranscodeWarning, read_targets,
};

use crate::cli::common::FileKindArg;

/// A card file parsed for a command, with the rules and targets used.
pub struct Loaded {
    pub file: CardFile,
    pub dialect: ConfiguredDialect,
    pub targets: Option<ReplacementTable>,
    pub warnings: Vec<TranscodeWarning>,
}

/// Read and parse `path` (or stdin for `-`). The kind comes from the
/// override, then the settings, then the extension.
pub fn load_card_file(
    path: &Path,
    kind: Option<FileKindArg>,
    params: Option<&Path>,
    settings: &Settings,
) -> Result<Loaded> {
    let mut warnings = Vec::new();
    let targets = match params {
        Some(params) => {
            let parsed = read_targets(params)?;
            warnings.extend(parsed.warnings);
            Some(parsed.value)
        }
        None => None,
    };

    let (filename, text, base_dir) = if path.as_os_str() == "-" {
        ("stdin".to_string(), read_stdin()?, None)
    } else {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (filename, text, path.parent())
    };
    let kind = kind
        .map(Into::into)
        .unwrap_or_else(|| settings.kind_for(&filename));
    let dialect = settings.dialect(kind);
    let options = ParseOptions {
        targets: targets.as_ref(),
        base_dir,
    };
    let parsed = CardFile::parse(&dialect, &filename, &text, &options)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    warnings.extend(parsed.warnings);
    tracing::info!(
        file = %path.display(),
        kind = %dialect.kind(),
        cards = parsed.value.len(),
        "loaded card file"
    );
    Ok(Loaded {
        file: parsed.value,
        dialect,
        targets,
        warnings,
    })
}

/// Read the entire stdin stream into memory.
pub fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read from stdin")?;
    Ok(buffer)
}

/// Persist a string either to a file or stdout when `-` is provided.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str() == "-" {
        io::stdout().write_all(content.as_bytes())?;
        return Ok(());
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Produce a line-by-line diff of two texts and whether they differ.
pub fn diff_text(expected: &str, actual: &str) -> (String, bool) {
    let exp_lines: Vec<&str> = expected.lines().collect();
    let act_lines: Vec<&str> = actual.lines().collect();
    let max = exp_lines.len().max(act_lines.len());
    let mut output = String::new();
    let mut changed = false;
    for i in 0..max {
        let exp = exp_lines.get(i).copied();
        let act = act_lines.get(i).copied();
        if exp != act {
            changed = true;
            output.push_str(&format!("line {:>4}:\n", i + 1));
            output.push_str(&format!("  expected |{}|\n", exp.unwrap_or("")));
            output.push_str(&format!("  actual   |{}|\n", act.unwrap_or("")));
        }
    }
    if !changed && expected != actual {
        changed = true;
        output.push_str("line endings differ\n");
    }
    (output, changed)
}
