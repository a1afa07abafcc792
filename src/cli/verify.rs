//! Round-trip verification (`cardfile verify`).

use anyhow::{Context, Result, anyhow};
use cardfile::{CardFile, ParseOptions, Settings, WriteOptions};
use clap::Args;

use crate::cli::file::InputArgs;
use crate::cli::utils::{Loaded, diff_text};

/// Arguments for `cardfile verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Treat any difference from the input as an error.
    #[arg(long)]
    pub strict: bool,
}

/// Outcome of writing a file, reading the output back and writing it again.
#[derive(Debug)]
pub struct RoundTrip {
    pub filename: String,
    pub cards: usize,
    pub warnings: usize,
    /// Diff between the first and second write, if they differ.
    pub unstable: Option<String>,
    /// Diff between the input and the first write, if they differ.
    pub input_changed: Option<String>,
}

impl RoundTrip {
    /// Unstable output always fails. A changed input fails only when `strict`.
    pub fn check(&self, strict: bool) -> Result<()> {
        if self.unstable.is_some() {
            return Err(anyhow!(
                "writing {} is not stable across a second round trip",
                self.filename
            ));
        }
        if strict && self.input_changed.is_some() {
            return Err(anyhow!("round trip changed the text of {}", self.filename));
        }
        Ok(())
    }
}

/// Serialize `loaded`, parse the output and serialize it again, comparing
/// both passes with each other and the first with `original`.
pub fn round_trip(loaded: &Loaded, original: &str) -> Result<RoundTrip> {
    let options = WriteOptions {
        targets: loaded.targets.as_ref(),
        rename: None,
    };
    let written = loaded.file.serialize(&loaded.dialect, &options);
    let reparsed = CardFile::parse(
        &loaded.dialect,
        &loaded.file.filename(),
        &written.text,
        &ParseOptions {
            targets: loaded.targets.as_ref(),
            base_dir: None,
        },
    )
    .context("serialized output no longer parses")?
    .value;
    let rewritten = reparsed.serialize(&loaded.dialect, &options);

    let (unstable, unstable_changed) = diff_text(&written.text, &rewritten.text);
    let (input, input_changed) = diff_text(original, &written.text);
    Ok(RoundTrip {
        filename: loaded.file.filename(),
        cards: loaded.file.len(),
        warnings: loaded.warnings.len() + written.warnings.len(),
        unstable: unstable_changed.then_some(unstable),
        input_changed: input_changed.then_some(input),
    })
}

/// Parse and serialize twice. The second pass must reproduce the first, and
/// any difference from the input is reported.
pub fn handle(args: VerifyArgs, settings: &Settings) -> Result<()> {
    if args.input.file.as_os_str() == "-" {
        return Err(anyhow!("verify needs a file path, not stdin"));
    }
    let loaded = args.input.load(settings)?;
    let original = std::fs::read_to_string(&args.input.file)
        .with_context(|| format!("failed to read {}", args.input.file.display()))?;
    let result = round_trip(&loaded, &original)?;

    if let Some(diff) = result.unstable.as_ref().or(result.input_changed.as_ref()) {
        print!("{diff}");
    }
    result.check(args.strict)?;
    if result.input_changed.is_some() {
        println!("output is stable; input differs in layout or path form");
    } else {
        println!(
            "verification passed: {} cards, {} warnings",
            result.cards, result.warnings
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardfile::{ConfiguredDialect, FileKind};

    fn loaded(text: &str) -> Loaded {
        let dialect = ConfiguredDialect::from(FileKind::Project);
        let parsed =
            CardFile::parse(&dialect, "model.prj", text, &ParseOptions::default()).unwrap();
        Loaded {
            file: parsed.value,
            dialect,
            targets: None,
            warnings: parsed.warnings,
        }
    }

    #[test]
    fn relative_paths_pass_strict() {
        let text = "GSSHAPROJECT\nMAP_FREQ          30\nELEVATION \"model.ele\"\nQUIET\n";
        let result = round_trip(&loaded(text), text).unwrap();
        assert!(result.unstable.is_none());
        assert!(result.input_changed.is_none());
        assert_eq!(result.cards, 4);
        assert!(result.check(true).is_ok());
    }

    #[test]
    fn absolute_paths_fail_only_under_strict() {
        let text = "GSSHAPROJECT\nELEVATION \"/data/model.ele\"\n";
        let result = round_trip(&loaded(text), text).unwrap();
        assert!(result.unstable.is_none());
        let diff = result.input_changed.as_deref().unwrap();
        assert!(diff.contains("|ELEVATION \"model.ele\"|"));
        assert!(result.check(false).is_ok());
        let err = result.check(true).unwrap_err();
        assert!(err.to_string().contains("changed the text of model.prj"));
    }

    #[test]
    fn unstable_output_always_fails() {
        let result = RoundTrip {
            filename: "model.prj".to_string(),
            cards: 1,
            warnings: 0,
            unstable: Some("line    1:\n".to_string()),
            input_changed: None,
        };
        assert!(result.check(false).is_err());
    }
}
