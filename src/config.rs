//! Optional JSON settings that extend the built-in dialect rules.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cardfile::split_filename;
use crate::dialect::{ConfiguredDialect, FileKind};

/// Settings file contents, e.g.
///
/// ```json
/// { "extensions": { "tbl": "mapping_table" },
///   "count_cards": { "project": ["NUM_GAGES"] } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// File extension (without dot) to file kind overrides.
    pub extensions: BTreeMap<String, FileKind>,
    /// Additional count cards per file kind.
    pub count_cards: BTreeMap<FileKind, Vec<String>>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Load from `path` when given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn kind_for(&self, filename: &str) -> FileKind {
        let (_, extension) = split_filename(filename);
        self.extensions
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, kind)| *kind)
            .unwrap_or_else(|| FileKind::from_extension(extension))
    }

    pub fn dialect(&self, kind: FileKind) -> ConfiguredDialect {
        let extra = self.count_cards.get(&kind).cloned().unwrap_or_default();
        ConfiguredDialect::new(kind, extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::CardDialect;
    use std::io::Write;

    #[test]
    fn defaults_follow_extensions() {
        let settings = Settings::default();
        assert_eq!(settings.kind_for("model.prj"), FileKind::Project);
        assert_eq!(settings.kind_for("model.gag"), FileKind::Generic);
    }

    #[test]
    fn loads_overrides_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"extensions": {{"TBL": "mapping_table"}}, "count_cards": {{"project": ["NUM_GAGES"]}}}}"#
        )
        .unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.kind_for("soils.tbl"), FileKind::MappingTable);
        assert!(settings.dialect(FileKind::Project).is_count_card("num_gages"));
    }

    #[test]
    fn bad_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings"));
    }
}
