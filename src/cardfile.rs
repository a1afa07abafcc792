//! Card file transcoder: text to ordered card records and back.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::card::{Card, CardValue, Line, negative_id};
use crate::dialect::{CardDialect, FileKind};
use crate::error::{Parsed, TranscodeError, TranscodeWarning};
use crate::lexer::{self, Field};
use crate::paths::{self, Rename};
use crate::replace::{ReplacementTable, looks_like_token};

/// Inputs for [`CardFile::parse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions<'a> {
    /// Targets used to turn tokens into references.
    pub targets: Option<&'a ReplacementTable>,
    /// Directory used to check that included files exist.
    pub base_dir: Option<&'a Path>,
}

/// Inputs for [`CardFile::serialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions<'a> {
    /// Targets used to turn references back into tokens. Without them
    /// references are written as their negative ID.
    pub targets: Option<&'a ReplacementTable>,
    pub rename: Option<&'a Rename>,
}

/// Output of [`CardFile::serialize`].
#[derive(Debug, Clone)]
pub struct Serialized {
    pub text: String,
    pub warnings: Vec<TranscodeWarning>,
}

/// An ordered card file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFile {
    pub kind: FileKind,
    /// File name without extension; the project prefix for project files.
    pub name: String,
    pub extension: String,
    lines: Vec<Line>,
}

/// Split `model.prj` into (`model`, `prj`).
pub fn split_filename(filename: &str) -> (&str, &str) {
    let base = paths::relative(filename);
    match base.split_once('.') {
        Some((stem, _)) => (stem, base.rsplit('.').next().unwrap_or("")),
        None => (base, ""),
    }
}

impl CardFile {
    pub fn new<N: Into<String>, E: Into<String>>(kind: FileKind, name: N, extension: E) -> Self {
        Self {
            kind,
            name: name.into(),
            extension: extension.into(),
            lines: Vec::new(),
        }
    }

    pub fn from_lines<N: Into<String>, E: Into<String>>(
        kind: FileKind,
        name: N,
        extension: E,
        lines: Vec<Line>,
    ) -> Self {
        Self {
            lines,
            ..Self::new(kind, name, extension)
        }
    }

    /// Parse `text`, read from a file called `filename`.
    pub fn parse(
        dialect: &dyn CardDialect,
        filename: &str,
        text: &str,
        options: &ParseOptions<'_>,
    ) -> Result<Parsed<Self>, TranscodeError> {
        let (name, extension) = split_filename(filename);
        let mut parsed = Parsed::new(Self::new(dialect.kind(), name, extension));
        for (idx, raw) in text.lines().enumerate() {
            if raw.trim().is_empty() || dialect.is_comment(raw) {
                parsed.value.lines.push(Line::Trivia {
                    text: raw.to_string(),
                });
                continue;
            }
            let split = lexer::split_card_line(raw, idx + 1)?;
            let mut card = Card::new(split.name, None);
            if let Some(raw_value) = split.value {
                card.spacing = Some(split.spacing.to_string());
                let fields = lexer::fields(raw_value, idx + 1)?;
                let (value, quote) =
                    interpret(dialect, split.name, raw_value, &fields, options, &mut parsed);
                if let (Some(dir), CardValue::Literal(_)) = (options.base_dir, &value) {
                    if dialect.include(split.name).is_some() {
                        check_include(split.name, &fields, dir, &mut parsed);
                    }
                }
                card.value = Some(value);
                card.token_quote = quote;
            }
            parsed.value.lines.push(Line::Card(card));
        }
        debug!(
            file = %filename,
            kind = %dialect.kind(),
            cards = parsed.value.len(),
            warnings = parsed.warnings.len(),
            "parsed card file"
        );
        Ok(parsed)
    }

    /// Write the cards back out in their original order.
    pub fn serialize(&self, dialect: &dyn CardDialect, options: &WriteOptions<'_>) -> Serialized {
        let mut out = Serialized {
            text: String::new(),
            warnings: Vec::new(),
        };
        for line in &self.lines {
            match line {
                Line::Trivia { text } => out.text.push_str(text),
                Line::Card(card) => {
                    out.text.push_str(&card.name);
                    if let Some(value) = &card.value {
                        let rendered = render_value(dialect, card, value, options, &mut out);
                        match &card.spacing {
                            Some(spacing) => out.text.push_str(spacing),
                            None => out.text.push_str(&dialect.alignment().spacing(&card.name)),
                        }
                        out.text.push_str(&rendered);
                    }
                }
            }
            out.text.push('\n');
        }
        out
    }

    pub fn filename(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.lines.iter().filter_map(Line::as_card)
    }

    pub fn cards_mut(&mut self) -> impl Iterator<Item = &mut Card> {
        self.lines.iter_mut().filter_map(|line| match line {
            Line::Card(card) => Some(card),
            Line::Trivia { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.cards().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First card with the given name (case-insensitive).
    pub fn card(&self, name: &str) -> Option<&Card> {
        self.cards().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn card_mut(&mut self, name: &str) -> Option<&mut Card> {
        self.cards_mut().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Literal text of a card with surrounding quotes removed.
    pub fn literal(&self, name: &str) -> Option<String> {
        let raw = self.card(name)?.value.as_ref()?.as_literal()?;
        let fields = lexer::fields(raw, 0).ok()?;
        match fields.as_slice() {
            [single] => Some(single.text.clone()),
            _ => Some(raw.to_string()),
        }
    }

    /// Assign a value, appending the card if it does not exist. An empty
    /// value turns the card into a flag.
    ///
    /// The value is read the way [`CardFile::parse`] would read it back: a
    /// bare `-N` on a card that can hold a reference becomes `Reference(N)`.
    pub fn set_card(
        &mut self,
        dialect: &dyn CardDialect,
        name: &str,
        value: &str,
    ) -> Result<(), TranscodeError> {
        let value = value.trim();
        let new_value = if value.is_empty() {
            None
        } else {
            let fields = lexer::fields(value, 0)?;
            Some(edited_value(dialect, name, value, &fields))
        };
        match self.card_mut(name) {
            Some(card) => {
                card.value = new_value;
                card.token_quote = None;
            }
            None => self.lines.push(Line::Card(Card::new(name, new_value))),
        }
        Ok(())
    }

    /// Point a card at a replacement target, appending it if needed.
    pub fn set_reference(
        &mut self,
        dialect: &dyn CardDialect,
        name: &str,
        target: &str,
        table: &ReplacementTable,
    ) -> Result<(), TranscodeError> {
        if !dialect.supports_replacement() {
            return Err(TranscodeError::ReplacementUnsupported {
                kind: dialect.kind().to_string(),
            });
        }
        if !dialect.is_replaceable(name) {
            return Err(TranscodeError::CountCard {
                card: name.to_string(),
            });
        }
        let id = table
            .by_name(target)
            .ok_or_else(|| TranscodeError::UnknownTarget(target.to_string()))?
            .id;
        match self.card_mut(name) {
            Some(card) => card.value = Some(CardValue::Reference(id)),
            None => self
                .lines
                .push(Line::Card(Card::new(name, Some(CardValue::Reference(id))))),
        }
        Ok(())
    }

    /// Remove the first card with this name.
    pub fn delete_card(&mut self, name: &str) -> Option<Card> {
        let idx = self
            .lines
            .iter()
            .position(|line| matches!(line, Line::Card(c) if c.name.eq_ignore_ascii_case(name)))?;
        match self.lines.remove(idx) {
            Line::Card(card) => Some(card),
            Line::Trivia { .. } => None,
        }
    }

    /// SHA-256 over the ordered cards in their stored encoding.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for card in self.cards() {
            hasher.update(card.name.as_bytes());
            hasher.update([0u8]);
            if let Some(value) = card.stored_value() {
                hasher.update(value.as_bytes());
            }
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        format!("{digest:02x}")
    }
}

/// Decide whether a parsed value is a literal or a replacement reference.
fn interpret(
    dialect: &dyn CardDialect,
    card: &str,
    raw: &str,
    fields: &[Field],
    options: &ParseOptions<'_>,
    parsed: &mut Parsed<CardFile>,
) -> (CardValue, Option<char>) {
    let literal = || (CardValue::literal(raw), None);
    let [field] = fields else {
        return literal();
    };
    if !dialect.supports_replacement() || dialect.is_literal_card(card) {
        return literal();
    }
    let text = field.text.as_str();
    let target = options.targets.and_then(|t| t.by_name(text));
    let bare_id = field.quote.is_none().then(|| negative_id(text)).flatten();

    if dialect.is_count_card(card) {
        let attempted = target.is_some()
            || bare_id.is_some()
            || (options.targets.is_some() && looks_like_token(text));
        if attempted {
            parsed.warn(TranscodeWarning::UnsupportedReplacementContext {
                card: card.to_string(),
                value: raw.to_string(),
            });
        }
        return literal();
    }

    if let Some(target) = target {
        return (CardValue::Reference(target.id), field.quote);
    }
    if let Some(id) = bare_id {
        if let Some(table) = options.targets {
            if table.by_id(id).is_none() {
                parsed.warn(TranscodeWarning::UnresolvedReplacementReference {
                    card: card.to_string(),
                    reference: raw.to_string(),
                });
            }
        }
        return (CardValue::Reference(id), None);
    }
    if options.targets.is_some() && looks_like_token(text) {
        parsed.warn(TranscodeWarning::UnresolvedReplacementReference {
            card: card.to_string(),
            reference: text.to_string(),
        });
    }
    literal()
}

/// Value stored by an edit. Mirrors the bare negative ID rule of `interpret`
/// so an edited card reads back unchanged.
fn edited_value(dialect: &dyn CardDialect, card: &str, raw: &str, fields: &[Field]) -> CardValue {
    if let [field] = fields {
        if field.quote.is_none() && dialect.is_replaceable(card) {
            if let Some(id) = negative_id(&field.text) {
                debug!(card, %id, "edited value is a replacement reference");
                return CardValue::Reference(id);
            }
        }
    }
    CardValue::literal(raw)
}

fn check_include(card: &str, fields: &[Field], dir: &Path, parsed: &mut Parsed<CardFile>) {
    let Some(field) = fields.iter().find(|f| paths::is_path_like(&f.text)) else {
        return;
    };
    let path = dir.join(paths::relative(&field.text));
    if !path.exists() {
        parsed.warn(TranscodeWarning::MissingReferencedFile {
            card: card.to_string(),
            path,
        });
    }
}

fn render_value(
    dialect: &dyn CardDialect,
    card: &Card,
    value: &CardValue,
    options: &WriteOptions<'_>,
    out: &mut Serialized,
) -> String {
    match value {
        CardValue::Reference(id) => {
            let Some(table) = options.targets else {
                return value.to_stored();
            };
            match table.by_id(*id) {
                Some(target) => match card.token_quote {
                    Some(q) => format!("{q}{}{q}", target.name),
                    None => target.name.clone(),
                },
                None => {
                    let warning = TranscodeWarning::UnresolvedReplacementReference {
                        card: card.name.clone(),
                        reference: value.to_stored(),
                    };
                    warning.log();
                    out.warnings.push(warning);
                    value.to_stored()
                }
            }
        }
        CardValue::Literal(raw) => {
            if !dialect.rewrites_paths() {
                return raw.clone();
            }
            if dialect.is_location_card(&card.name) {
                return "\"\"".to_string();
            }
            rewrite_paths(raw, options.rename)
        }
    }
}

/// Make path fields relative and apply the rename, leaving everything else
/// in the value untouched.
fn rewrite_paths(raw: &str, rename: Option<&Rename>) -> String {
    let Ok(fields) = lexer::fields(raw, 0) else {
        return raw.to_string();
    };
    let mut out = raw.to_string();
    for field in fields.iter().rev() {
        if !paths::is_path_like(&field.text) {
            continue;
        }
        let mut replaced = paths::relative(&field.text).to_string();
        if let Some(rename) = rename {
            replaced = rename.apply(&replaced);
        }
        if replaced != field.text {
            out.replace_range(field.span.clone(), &field.requote(&replaced));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::ConfiguredDialect;
    use crate::replace::TargetId;
    use pretty_assertions::assert_eq;

    fn project() -> ConfiguredDialect {
        ConfiguredDialect::from(FileKind::Project)
    }

    fn parse(dialect: &ConfiguredDialect, text: &str) -> CardFile {
        CardFile::parse(dialect, "model.prj", text, &ParseOptions::default())
            .unwrap()
            .value
    }

    #[test]
    fn untouched_file_is_reproduced() {
        let text = "GSSHAPROJECT\n# calibrated run\nWMS 10.1 64-bit\nMAP_FREQ          30\n\nQUIET\nELEVATION  \"model.ele\"\n";
        let file = parse(&project(), text);
        assert_eq!(file.len(), 5);
        let out = file.serialize(&project(), &WriteOptions::default());
        assert_eq!(out.text, text);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn reassigned_value_keeps_other_lines() {
        let dialect = ConfiguredDialect::from(FileKind::Generic);
        let mut file = parse(&dialect, "TOT_TIME 120\nMAP_FREQ 30\nTIMESTEP 10\n");
        file.set_card(&dialect, "MAP_FREQ", "10").unwrap();
        let out = file.serialize(&dialect, &WriteOptions::default());
        assert_eq!(out.text, "TOT_TIME 120\nMAP_FREQ 10\nTIMESTEP 10\n");
    }

    #[test]
    fn new_cards_use_dialect_alignment() {
        let mut file = CardFile::new(FileKind::Project, "model", "prj");
        file.set_card(&project(), "MAP_FREQ", "30").unwrap();
        file.set_card(&project(), "QUIET", "").unwrap();
        let out = file.serialize(&project(), &WriteOptions::default());
        assert_eq!(out.text, format!("MAP_FREQ{}30\nQUIET\n", " ".repeat(17)));
    }

    #[test]
    fn absolute_paths_are_written_relative() {
        let text = "ELEVATION \"/data/models/model.ele\"\nPROJECT_PATH \"/data/models\"\nREPLACE_FOLDER \"/data/models/runs/\"\n";
        let file = parse(&project(), text);
        let out = file.serialize(&project(), &WriteOptions::default());
        assert_eq!(
            out.text,
            "ELEVATION \"model.ele\"\nPROJECT_PATH \"\"\nREPLACE_FOLDER \"runs\"\n"
        );
    }

    #[test]
    fn rename_rewrites_prefixed_paths_only() {
        let text = "ELEVATION \"model.ele\"\nHMET_WES \"hmet.hmt\"\n#PROJECTION_FILE \"model_prj.pro\"\nTOT_TIME 120\n";
        let file = parse(&project(), text);
        let rename = Rename::new("model", "run2");
        let out = file.serialize(
            &project(),
            &WriteOptions {
                targets: None,
                rename: Some(&rename),
            },
        );
        assert_eq!(
            out.text,
            "ELEVATION \"run2.ele\"\nHMET_WES \"hmet.hmt\"\n#PROJECTION_FILE \"run2_prj.pro\"\nTOT_TIME 120\n"
        );
    }

    #[test]
    fn replacement_tokens_become_references() {
        let table = ReplacementTable::from_entries([("[ROUGH]", "%f"), ("[SLOPE]", "%f")]);
        let options = ParseOptions {
            targets: Some(&table),
            base_dir: None,
        };
        let parsed =
            CardFile::parse(&project(), "model.prj", "TOT_TIME 120\nOUTSLOPE [SLOPE]\n", &options)
                .unwrap();
        assert!(parsed.warnings.is_empty());
        let card = parsed.value.card("OUTSLOPE").unwrap();
        assert_eq!(card.value, Some(CardValue::Reference(TargetId(2))));
        assert_eq!(card.stored_value().as_deref(), Some("-2"));
    }

    #[test]
    fn references_without_table_pass_through() {
        let table = ReplacementTable::from_entries([("[ROUGH]", "%f")]);
        let options = ParseOptions {
            targets: Some(&table),
            base_dir: None,
        };
        let file = CardFile::parse(&project(), "model.prj", "MANNING_N \"[ROUGH]\"\n", &options)
            .unwrap()
            .value;
        let raw = file.serialize(&project(), &WriteOptions::default());
        assert_eq!(raw.text, "MANNING_N -1\n");
        let resolved = file.serialize(
            &project(),
            &WriteOptions {
                targets: Some(&table),
                rename: None,
            },
        );
        assert_eq!(resolved.text, "MANNING_N \"[ROUGH]\"\n");
    }

    #[test]
    fn unknown_token_stays_literal_with_warning() {
        let table = ReplacementTable::from_entries([("[ROUGH]", "%f")]);
        let options = ParseOptions {
            targets: Some(&table),
            base_dir: None,
        };
        let parsed =
            CardFile::parse(&project(), "model.prj", "MANNING_N [MISSING]\n", &options).unwrap();
        assert_eq!(
            parsed.value.card("MANNING_N").unwrap().value,
            Some(CardValue::literal("[MISSING]"))
        );
        assert!(matches!(
            parsed.warnings.as_slice(),
            [TranscodeWarning::UnresolvedReplacementReference { .. }]
        ));
    }

    #[test]
    fn unknown_reference_id_is_written_raw_with_warning() {
        let table = ReplacementTable::from_entries([("[ROUGH]", "%f")]);
        let mut file = CardFile::new(FileKind::Project, "model", "prj");
        file.lines.push(Line::Card(Card::new(
            "MANNING_N",
            Some(CardValue::Reference(TargetId(9))),
        )));
        let out = file.serialize(
            &project(),
            &WriteOptions {
                targets: Some(&table),
                rename: None,
            },
        );
        assert!(out.text.ends_with("-9\n"));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn literal_cards_keep_negative_numbers() {
        let file = parse(&project(), "GMT -7\n");
        assert_eq!(file.card("GMT").unwrap().value, Some(CardValue::literal("-7")));
    }

    #[test]
    fn generic_files_keep_negative_numbers() {
        let dialect = ConfiguredDialect::from(FileKind::Generic);
        let table = ReplacementTable::from_entries([("[ROUGH]", "%f")]);
        let options = ParseOptions {
            targets: Some(&table),
            base_dir: None,
        };
        let file = CardFile::parse(&dialect, "gage.txt", "OFFSET -1\nROUGH [ROUGH]\n", &options)
            .unwrap()
            .value;
        assert!(file.cards().all(|c| !c.is_reference()));
    }

    #[test]
    fn set_reference_rejects_count_cards() {
        let dialect = ConfiguredDialect::from(FileKind::MappingTable);
        let table = ReplacementTable::from_entries([("[N]", "%d")]);
        let mut file = CardFile::new(FileKind::MappingTable, "model", "cmt");
        let err = file
            .set_reference(&dialect, "NUM_IDS", "[N]", &table)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::CountCard { .. }));
        file.set_reference(&dialect, "ROUGH", "[N]", &table).unwrap();
        assert!(file.card("ROUGH").unwrap().is_reference());
    }

    #[test]
    fn whitespace_only_lines_are_trivia() {
        let text = "MAP_FREQ 30\n   \t\n\nQUIET\n";
        let file = parse(&project(), text);
        assert_eq!(file.len(), 2);
        assert_eq!(
            file.lines()[1],
            Line::Trivia {
                text: "   \t".to_string()
            }
        );
        assert_eq!(file.serialize(&project(), &WriteOptions::default()).text, text);
    }

    #[test]
    fn edited_negative_id_reads_back_unchanged() {
        let dialect = project();
        let mut file = parse(&dialect, "MANNING_N 0.05\nGMT -6\n");
        file.set_card(&dialect, "MANNING_N", "-5").unwrap();
        file.set_card(&dialect, "GMT", "-7").unwrap();
        let before: Vec<_> = file.cards().cloned().collect();
        assert_eq!(
            before[0].value,
            Some(CardValue::Reference(TargetId(5)))
        );
        assert_eq!(before[1].value, Some(CardValue::literal("-7")));

        let text = file.serialize(&dialect, &WriteOptions::default()).text;
        assert_eq!(text, "MANNING_N -5\nGMT -7\n");
        let reparsed = parse(&dialect, &text);
        let after: Vec<_> = reparsed.cards().cloned().collect();
        assert_eq!(after, before);
    }

    #[test]
    fn edits_in_generic_files_stay_literal() {
        let dialect = ConfiguredDialect::from(FileKind::Generic);
        let mut file = CardFile::new(FileKind::Generic, "gage", "gag");
        file.set_card(&dialect, "OFFSET", "-5").unwrap();
        assert_eq!(file.card("OFFSET").unwrap().value, Some(CardValue::literal("-5")));
    }

    #[test]
    fn delete_removes_card() {
        let mut file = parse(&project(), "A 1\nB 2\nC 3\n");
        let removed = file.delete_card("b").unwrap();
        assert_eq!(removed.name, "B");
        let names: Vec<_> = file.cards().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(file.delete_card("B").is_none());
    }

    #[test]
    fn literal_strips_quotes() {
        let file = parse(&project(), "ELEVATION \"model.ele\"\n");
        assert_eq!(file.literal("elevation").as_deref(), Some("model.ele"));
    }

    #[test]
    fn digest_tracks_values() {
        let mut file = parse(&project(), "A 1\n");
        let before = file.digest();
        file.set_card(&project(), "A", "2").unwrap();
        assert_ne!(before, file.digest());
        assert_eq!(before.len(), 64);
    }

    #[test]
    fn filename_split() {
        assert_eq!(split_filename("dir/model.prj"), ("model", "prj"));
        assert_eq!(split_filename("model_prj.pro"), ("model_prj", "pro"));
        assert_eq!(split_filename("README"), ("README", ""));
    }
}
