//! Replacement parameters: named placeholders that stand in for card values
//! across a project.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Parsed, TranscodeError, TranscodeWarning};

/// Positive identifier of a replacement target. Stored card values encode a
/// reference as the negative of this number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type tag of a replacement target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    String,
    Numeric,
}

impl TargetKind {
    /// Derive the type tag from a printf-style format such as `%.4f` or `%s`.
    pub fn from_format(format: &str) -> Self {
        if format.trim_end().ends_with('s') {
            TargetKind::String
        } else {
            TargetKind::Numeric
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplacementTarget {
    pub id: TargetId,
    /// Token written in place of a value, e.g. `[ROUGH]`.
    pub name: String,
    pub format: String,
    pub kind: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// The targets declared by a project, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplacementTable {
    targets: Vec<ReplacementTarget>,
}

impl ReplacementTable {
    /// Build a table, assigning IDs 1..=N in order.
    pub fn from_entries<I, N, F>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, F)>,
        N: Into<String>,
        F: Into<String>,
    {
        let targets = entries
            .into_iter()
            .enumerate()
            .map(|(idx, (name, format))| {
                let format = format.into();
                ReplacementTarget {
                    id: TargetId(idx as u32 + 1),
                    name: name.into(),
                    kind: TargetKind::from_format(&format),
                    format,
                    default: None,
                }
            })
            .collect();
        Self { targets }
    }

    /// Table built from already numbered targets, e.g. loaded from a store.
    pub fn from_targets(mut targets: Vec<ReplacementTarget>) -> Self {
        targets.sort_by_key(|t| t.id);
        Self { targets }
    }

    /// Parse a replacement parameters file: a count line followed by
    /// `NAME FORMAT` lines.
    pub fn parse(text: &str) -> Result<Parsed<Self>, TranscodeError> {
        let mut declared = None;
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let mut parts = raw.split_whitespace();
            let Some(first) = parts.next() else {
                continue;
            };
            match (parts.next(), parts.next()) {
                (None, _) if declared.is_none() && entries.is_empty() => {
                    let count: usize =
                        first
                            .parse()
                            .map_err(|_| TranscodeError::MalformedParameter {
                                line: idx + 1,
                                reason: format!("expected parameter count, found '{first}'"),
                            })?;
                    declared = Some(count);
                }
                (Some(format), None) => entries.push((first.to_string(), format.to_string())),
                _ => {
                    return Err(TranscodeError::MalformedParameter {
                        line: idx + 1,
                        reason: "expected 'NAME FORMAT'".to_string(),
                    });
                }
            }
        }
        let mut parsed = Parsed::new(Self::from_entries(entries));
        if let Some(declared) = declared {
            let found = parsed.value.len();
            if declared != found {
                parsed.warn(TranscodeWarning::ParameterCountMismatch { declared, found });
            }
        }
        Ok(parsed)
    }

    pub fn serialize(&self) -> String {
        let mut out = format!("{}\n", self.targets.len());
        for target in &self.targets {
            out.push_str(&format!("{} {}\n", target.name, target.format));
        }
        out
    }

    pub fn by_name(&self, name: &str) -> Option<&ReplacementTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn by_id(&self, id: TargetId) -> Option<&ReplacementTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplacementTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Take target defaults from the first realization of a values file.
    pub fn apply_defaults(&mut self, values: &ReplacementValues) {
        let Some(first) = values.realization(0) else {
            return;
        };
        for (target, value) in self.targets.iter_mut().zip(first) {
            target.default = Some(value.to_string());
        }
    }
}

/// Looks like a replacement token even when no target matches it.
pub fn looks_like_token(text: &str) -> bool {
    text.starts_with('[') && text.ends_with(']') && text.len() > 2
}

/// Replacement values file: one realization of every parameter per line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplacementValues {
    pub lines: Vec<String>,
}

impl ReplacementValues {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Whitespace separated values of the `index`-th non-blank line.
    pub fn realization(&self, index: usize) -> Option<Vec<&str>> {
        self.lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .nth(index)
            .map(|line| line.split_whitespace().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = "3\n[ROUGH] %.4f\n[SLOPE] %f\n[LABEL] %s\n";

    #[test]
    fn ids_follow_declaration_order() {
        let parsed = ReplacementTable::parse(PARAMS).unwrap();
        assert!(parsed.warnings.is_empty());
        let table = parsed.value;
        assert_eq!(table.by_name("[ROUGH]").unwrap().id, TargetId(1));
        assert_eq!(table.by_id(TargetId(3)).unwrap().kind, TargetKind::String);
        assert_eq!(table.by_id(TargetId(2)).unwrap().kind, TargetKind::Numeric);
    }

    #[test]
    fn count_mismatch_warns() {
        let parsed = ReplacementTable::parse("5\n[ROUGH] %f\n").unwrap();
        assert_eq!(
            parsed.warnings,
            vec![TranscodeWarning::ParameterCountMismatch {
                declared: 5,
                found: 1
            }]
        );
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let err = ReplacementTable::parse("1\n[ROUGH] %f extra\n").unwrap_err();
        assert!(matches!(err, TranscodeError::MalformedParameter { line: 2, .. }));
    }

    #[test]
    fn serialize_reproduces_file() {
        let table = ReplacementTable::parse(PARAMS).unwrap().value;
        assert_eq!(table.serialize(), PARAMS);
    }

    #[test]
    fn defaults_come_from_first_realization() {
        let mut table = ReplacementTable::parse(PARAMS).unwrap().value;
        let values = ReplacementValues::parse("\n0.05 0.001 wet\n0.07 0.002 dry\n");
        table.apply_defaults(&values);
        assert_eq!(table.by_id(TargetId(1)).unwrap().default.as_deref(), Some("0.05"));
        assert_eq!(table.by_id(TargetId(3)).unwrap().default.as_deref(), Some("wet"));
    }

    #[test]
    fn token_shape() {
        assert!(looks_like_token("[ROUGH]"));
        assert!(!looks_like_token("[]"));
        assert!(!looks_like_token("rough"));
    }
}
