//! Reading and writing a whole project: the project file, its replacement
//! files and the card files it includes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::cardfile::{CardFile, ParseOptions, WriteOptions};
use crate::config::Settings;
use crate::dialect::{CardDialect, FileKind, IncludeKind};
use crate::error::{Parsed, TranscodeWarning};
use crate::paths::{self, Rename};
use crate::replace::{ReplacementTable, ReplacementValues};
use crate::store::{CardStore, ChangeSet, FileId, ProjectInfo};

/// Read and parse one card file from disk. Includes are checked against the
/// file's own directory.
pub fn read_card_file(
    path: &Path,
    dialect: &dyn CardDialect,
    targets: Option<&ReplacementTable>,
) -> Result<Parsed<CardFile>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    let options = ParseOptions {
        targets,
        base_dir: path.parent(),
    };
    CardFile::parse(dialect, filename, &text, &options)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Read a replacement parameters file.
pub fn read_targets(path: &Path) -> Result<Parsed<ReplacementTable>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ReplacementTable::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// A project and every card file read along with it.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project prefix, the project file name without extension.
    pub name: String,
    pub source_dir: Option<PathBuf>,
    pub project: CardFile,
    pub targets: Option<ReplacementTable>,
    pub values: Option<ReplacementValues>,
    /// Included card files, in the order their cards appear.
    pub files: Vec<CardFile>,
    pub settings: Settings,
}

impl Project {
    /// Read `filename` from `dir` together with its replacement files and
    /// included card files. Missing includes are reported and skipped.
    pub fn read(dir: &Path, filename: &str, settings: Settings) -> Result<Parsed<Self>> {
        let path = dir.join(filename);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read project file {}", path.display()))?;

        // Locate the replacement files before the real parse so references in
        // the project file itself can be resolved.
        let scan = CardFile::parse(
            FileKind::Generic.rules(),
            filename,
            &text,
            &ParseOptions::default(),
        )
        .with_context(|| format!("failed to parse project file {}", path.display()))?
        .value;

        let mut warnings = Vec::new();
        let mut targets = None;
        if let Some(name) = scan.literal("REPLACE_PARAMS") {
            let params_path = dir.join(paths::relative(&name));
            if params_path.exists() {
                let parsed = read_targets(&params_path)?;
                warnings.extend(parsed.warnings);
                targets = Some(parsed.value);
            }
        }
        let mut values = None;
        if let Some(name) = scan.literal("REPLACE_VALS") {
            let values_path = dir.join(paths::relative(&name));
            if values_path.exists() {
                let text = fs::read_to_string(&values_path)
                    .with_context(|| format!("failed to read {}", values_path.display()))?;
                values = Some(ReplacementValues::parse(&text));
            }
        }
        if let (Some(table), Some(values)) = (targets.as_mut(), values.as_ref()) {
            table.apply_defaults(values);
        }

        let dialect = settings.dialect(FileKind::Project);
        let options = ParseOptions {
            targets: targets.as_ref(),
            base_dir: Some(dir),
        };
        let parsed = CardFile::parse(&dialect, filename, &text, &options)
            .with_context(|| format!("failed to parse project file {}", path.display()))?;
        warnings.extend(parsed.warnings);
        let project = parsed.value;

        let mut files = Vec::new();
        for card in project.cards() {
            let Some(IncludeKind::Cards(kind)) = dialect.include(&card.name) else {
                continue;
            };
            let Some(include) = project.literal(&card.name) else {
                continue;
            };
            let include_path = dir.join(paths::relative(&include));
            if !include_path.exists() {
                // Already reported by the project parse.
                continue;
            }
            let parsed = read_card_file(
                &include_path,
                &settings.dialect(kind),
                targets.as_ref(),
            )?;
            warnings.extend(parsed.warnings);
            files.push(parsed.value);
        }

        info!(
            project = %project.name,
            files = files.len(),
            targets = targets.as_ref().map_or(0, ReplacementTable::len),
            warnings = warnings.len(),
            "read project"
        );
        Ok(Parsed {
            value: Self {
                name: project.name.clone(),
                source_dir: Some(dir.to_path_buf()),
                project,
                targets,
                values,
                files,
                settings,
            },
            warnings,
        })
    }

    /// Write the project into `dir`, optionally under a new name. Files
    /// prefixed with the old name are renamed and opaque includes copied.
    pub fn write(&self, dir: &Path, new_name: Option<&str>) -> Result<Vec<TranscodeWarning>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
        let rename = new_name.map(|to| Rename::new(self.name.as_str(), to));
        let rename_file = |filename: &str| match &rename {
            Some(rename) => rename.apply(filename),
            None => filename.to_string(),
        };
        let options = WriteOptions {
            targets: self.targets.as_ref(),
            rename: rename.as_ref(),
        };
        let mut warnings = Vec::new();

        let dialect = self.settings.dialect(FileKind::Project);
        let out = self.project.serialize(&dialect, &options);
        warnings.extend(out.warnings);
        write_file(&dir.join(rename_file(&self.project.filename())), &out.text)?;
        self.copy_opaque(&self.project, &dialect, dir, &rename_file, &mut warnings)?;

        if let (Some(table), Some(name)) = (&self.targets, self.project.literal("REPLACE_PARAMS")) {
            write_file(
                &dir.join(rename_file(paths::relative(&name))),
                &table.serialize(),
            )?;
        }
        if let (Some(values), Some(name)) = (&self.values, self.project.literal("REPLACE_VALS")) {
            write_file(
                &dir.join(rename_file(paths::relative(&name))),
                &values.serialize(),
            )?;
        }

        for file in &self.files {
            let dialect = self.settings.dialect(file.kind);
            let out = file.serialize(&dialect, &options);
            warnings.extend(out.warnings);
            write_file(&dir.join(rename_file(&file.filename())), &out.text)?;
            self.copy_opaque(file, &dialect, dir, &rename_file, &mut warnings)?;
        }
        info!(
            project = %new_name.unwrap_or(self.name.as_str()),
            dir = %dir.display(),
            "wrote project"
        );
        Ok(warnings)
    }

    fn copy_opaque(
        &self,
        file: &CardFile,
        dialect: &dyn CardDialect,
        dir: &Path,
        rename_file: &dyn Fn(&str) -> String,
        warnings: &mut Vec<TranscodeWarning>,
    ) -> Result<()> {
        let Some(source_dir) = &self.source_dir else {
            return Ok(());
        };
        for card in file.cards() {
            if dialect.include(&card.name) != Some(IncludeKind::Opaque) {
                continue;
            }
            let Some(value) = card.value.as_ref().and_then(|v| v.as_literal()) else {
                continue;
            };
            let Ok(fields) = crate::lexer::fields(value, 0) else {
                continue;
            };
            let Some(field) = fields.iter().find(|f| paths::is_path_like(&f.text)) else {
                continue;
            };
            let name = paths::relative(&field.text);
            let source = source_dir.join(name);
            let target = dir.join(rename_file(name));
            if !source.exists() {
                let warning = TranscodeWarning::MissingReferencedFile {
                    card: card.name.clone(),
                    path: source,
                };
                warning.log();
                warnings.push(warning);
                continue;
            }
            if same_file(&source, &target) {
                continue;
            }
            fs::copy(&source, &target).with_context(|| {
                format!("failed to copy {} to {}", source.display(), target.display())
            })?;
            debug!(from = %source.display(), to = %target.display(), "copied include");
        }
        Ok(())
    }

    /// Replace the store contents with this project.
    pub fn save<S: CardStore + ?Sized>(&self, store: &mut S) -> Result<Vec<FileId>> {
        let mut changes = ChangeSet::new();
        for record in store.files() {
            changes.delete(record.id);
        }
        changes.add(self.project.clone());
        for file in &self.files {
            changes.add(file.clone());
        }
        changes
            .set_targets(self.targets.clone().unwrap_or_default())
            .set_values(self.values.clone().unwrap_or_default())
            .set_project(ProjectInfo {
                name: self.name.clone(),
                source_dir: self.source_dir.clone(),
            });
        let ids = store.commit(changes).context("failed to commit project")?;
        Ok(ids)
    }

    /// Rebuild a project from a store written by [`Project::save`].
    pub fn load<S: CardStore + ?Sized>(store: &S, settings: Settings) -> Result<Self> {
        let info = store
            .meta()
            .project
            .clone()
            .ok_or_else(|| anyhow!("store does not hold a project"))?;
        let mut project = None;
        let mut files = Vec::new();
        for record in store.files() {
            let file = store.load_file(record.id, &settings.dialect(record.kind))?;
            if record.kind == FileKind::Project && project.is_none() {
                project = Some(file);
            } else {
                files.push(file);
            }
        }
        let project = project.ok_or_else(|| anyhow!("store has no project file"))?;
        let targets = store.targets();
        let values = store.values();
        Ok(Self {
            name: info.name,
            source_dir: info.source_dir,
            project,
            targets: (!targets.is_empty()).then_some(targets),
            values: (!values.lines.is_empty()).then_some(values),
            files,
            settings,
        })
    }

    /// Included file called `filename`; directories are ignored.
    pub fn file(&self, filename: &str) -> Option<&CardFile> {
        let filename = paths::relative(filename);
        self.files
            .iter()
            .find(|f| f.filename().eq_ignore_ascii_case(filename))
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
