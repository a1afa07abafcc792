//! Persistence for parsed card files.
//!
//! A store keeps ordered card rows per file, the project's replacement
//! targets and values. Changes are staged in a [`ChangeSet`] and applied as a
//! unit by [`CardStore::commit`]. Card values are kept in their stored
//! encoding, where a replacement reference is the negative target ID.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::card::{Card, CardValue, Line};
use crate::cardfile::CardFile;
use crate::dialect::{CardDialect, FileKind};
use crate::replace::{ReplacementTable, ReplacementTarget, ReplacementValues};

const STORE_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no file with id {0} in store")]
    UnknownFile(FileId),
    #[error("store {} is empty", path.display())]
    Empty { path: PathBuf },
    #[error("line {line} of {}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project the stored files belong to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
}

/// Header record of a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreMeta {
    pub version: u8,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub project: Option<ProjectInfo>,
}

impl Default for StoreMeta {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            created_at: Utc::now(),
            project: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: FileId,
    pub kind: FileKind,
    pub name: String,
    pub extension: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub digest: String,
}

impl FileRecord {
    pub fn filename(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }
}

/// One card of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardRow {
    pub file: FileId,
    pub position: usize,
    pub name: String,
    /// Stored encoding of the value.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_quote: Option<char>,
}

/// A blank or comment line of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriviaRow {
    pub file: FileId,
    pub position: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Row {
    Card(CardRow),
    Trivia(TriviaRow),
}

/// Staged changes, applied together by [`CardStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    new: Vec<CardFile>,
    dirty: Vec<(FileId, CardFile)>,
    deleted: Vec<FileId>,
    targets: Option<ReplacementTable>,
    values: Option<ReplacementValues>,
    project: Option<ProjectInfo>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: CardFile) -> &mut Self {
        self.new.push(file);
        self
    }

    pub fn update(&mut self, id: FileId, file: CardFile) -> &mut Self {
        self.dirty.push((id, file));
        self
    }

    pub fn delete(&mut self, id: FileId) -> &mut Self {
        self.deleted.push(id);
        self
    }

    pub fn set_targets(&mut self, targets: ReplacementTable) -> &mut Self {
        self.targets = Some(targets);
        self
    }

    pub fn set_values(&mut self, values: ReplacementValues) -> &mut Self {
        self.values = Some(values);
        self
    }

    pub fn set_project(&mut self, project: ProjectInfo) -> &mut Self {
        self.project = Some(project);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty()
            && self.dirty.is_empty()
            && self.deleted.is_empty()
            && self.targets.is_none()
            && self.values.is_none()
            && self.project.is_none()
    }
}

/// Structured record store for card files.
pub trait CardStore {
    fn meta(&self) -> &StoreMeta;

    fn files(&self) -> Vec<FileRecord>;

    fn record(&self, id: FileId) -> Result<FileRecord, StoreError>;

    /// Ordered card rows of one file.
    fn cards_for(&self, id: FileId) -> Result<Vec<CardRow>, StoreError>;

    /// Rebuild a file, decoding negative values for replaceable cards.
    fn load_file(&self, id: FileId, dialect: &dyn CardDialect) -> Result<CardFile, StoreError>;

    fn targets(&self) -> ReplacementTable;

    fn values(&self) -> ReplacementValues;

    /// Apply every change or none. Returns the IDs given to new files, in order.
    fn commit(&mut self, changes: ChangeSet) -> Result<Vec<FileId>, StoreError>;

    fn files_of_kind(&self, kind: FileKind) -> Vec<FileRecord> {
        self.files().into_iter().filter(|f| f.kind == kind).collect()
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    meta: StoreMeta,
    files: BTreeMap<FileId, FileRecord>,
    rows: BTreeMap<FileId, Vec<Row>>,
    targets: Vec<ReplacementTarget>,
    values: Vec<String>,
    next_id: u64,
}

fn to_rows(id: FileId, file: &CardFile) -> Vec<Row> {
    file.lines()
        .iter()
        .enumerate()
        .map(|(position, line)| match line {
            Line::Card(card) => Row::Card(CardRow {
                file: id,
                position,
                name: card.name.clone(),
                value: card.stored_value(),
                spacing: card.spacing.clone(),
                token_quote: card.token_quote,
            }),
            Line::Trivia { text } => Row::Trivia(TriviaRow {
                file: id,
                position,
                text: text.clone(),
            }),
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, id: FileId, file: &CardFile, created_at: DateTime<Utc>) {
        let record = FileRecord {
            id,
            kind: file.kind,
            name: file.name.clone(),
            extension: file.extension.clone(),
            created_at,
            updated_at: Utc::now(),
            digest: file.digest(),
        };
        self.files.insert(id, record);
        self.rows.insert(id, to_rows(id, file));
        self.next_id = self.next_id.max(id.0 + 1);
    }

    fn push_row(&mut self, row: Row) {
        let id = match &row {
            Row::Card(card) => card.file,
            Row::Trivia(trivia) => trivia.file,
        };
        self.rows.entry(id).or_default().push(row);
    }

    fn sort_rows(&mut self) {
        for rows in self.rows.values_mut() {
            rows.sort_by_key(|row| match row {
                Row::Card(card) => card.position,
                Row::Trivia(trivia) => trivia.position,
            });
        }
    }
}

impl CardStore for MemoryStore {
    fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    fn files(&self) -> Vec<FileRecord> {
        self.files.values().cloned().collect()
    }

    fn record(&self, id: FileId) -> Result<FileRecord, StoreError> {
        self.files.get(&id).cloned().ok_or(StoreError::UnknownFile(id))
    }

    fn cards_for(&self, id: FileId) -> Result<Vec<CardRow>, StoreError> {
        let rows = self.rows.get(&id).ok_or(StoreError::UnknownFile(id))?;
        Ok(rows
            .iter()
            .filter_map(|row| match row {
                Row::Card(card) => Some(card.clone()),
                Row::Trivia(_) => None,
            })
            .collect())
    }

    fn load_file(&self, id: FileId, dialect: &dyn CardDialect) -> Result<CardFile, StoreError> {
        let record = self.record(id)?;
        let rows = self.rows.get(&id).ok_or(StoreError::UnknownFile(id))?;
        let lines = rows
            .iter()
            .map(|row| match row {
                Row::Card(row) => {
                    let value = row
                        .value
                        .as_deref()
                        .map(|raw| CardValue::from_stored(raw, dialect.is_replaceable(&row.name)));
                    Line::Card(Card {
                        name: row.name.clone(),
                        value,
                        spacing: row.spacing.clone(),
                        token_quote: row.token_quote,
                    })
                }
                Row::Trivia(row) => Line::Trivia {
                    text: row.text.clone(),
                },
            })
            .collect();
        Ok(CardFile::from_lines(
            record.kind,
            record.name,
            record.extension,
            lines,
        ))
    }

    fn targets(&self) -> ReplacementTable {
        ReplacementTable::from_targets(self.targets.clone())
    }

    fn values(&self) -> ReplacementValues {
        ReplacementValues {
            lines: self.values.clone(),
        }
    }

    fn commit(&mut self, changes: ChangeSet) -> Result<Vec<FileId>, StoreError> {
        for id in changes
            .dirty
            .iter()
            .map(|(id, _)| id)
            .chain(changes.deleted.iter())
        {
            if !self.files.contains_key(id) {
                return Err(StoreError::UnknownFile(*id));
            }
        }
        for id in &changes.deleted {
            self.files.remove(id);
            self.rows.remove(id);
        }
        for (id, file) in &changes.dirty {
            // Deleted in the same change set.
            let Some(created_at) = self.files.get(id).map(|r| r.created_at) else {
                continue;
            };
            self.insert(*id, file, created_at);
        }
        let mut created = Vec::with_capacity(changes.new.len());
        for file in &changes.new {
            let id = FileId(self.next_id);
            self.insert(id, file, Utc::now());
            created.push(id);
        }
        if let Some(targets) = changes.targets {
            self.targets = targets.iter().cloned().collect();
        }
        if let Some(values) = changes.values {
            self.values = values.lines;
        }
        if let Some(project) = changes.project {
            self.meta.project = Some(project);
        }
        debug!(
            created = created.len(),
            updated = changes.dirty.len(),
            deleted = changes.deleted.len(),
            "committed change set"
        );
        Ok(created)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum StoreLine {
    Header(StoreMeta),
    File(FileRecord),
    Card(CardRow),
    Trivia(TriviaRow),
    Target(ReplacementTarget),
    Value { text: String },
}

/// Store persisted as JSON lines: a header followed by one record per line.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonlStore {
    /// Open an existing store, or start an empty one at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self {
                path: path.to_path_buf(),
                inner: MemoryStore::new(),
            })
        }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mut lines = BufReader::new(file).lines();
        let header_line = lines.next().ok_or_else(|| StoreError::Empty {
            path: path.to_path_buf(),
        })??;
        let corrupt = |line: usize, reason: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let meta = match serde_json::from_str(&header_line) {
            Ok(StoreLine::Header(meta)) => meta,
            Ok(_) => return Err(corrupt(1, "expected store header".to_string())),
            Err(err) => return Err(corrupt(1, err.to_string())),
        };
        let mut inner = MemoryStore {
            meta,
            ..MemoryStore::default()
        };
        for (idx, raw) in lines.enumerate() {
            let raw = raw?;
            if raw.trim().is_empty() {
                continue;
            }
            let line: StoreLine =
                serde_json::from_str(&raw).map_err(|err| corrupt(idx + 2, err.to_string()))?;
            match line {
                StoreLine::Header(_) => {
                    return Err(corrupt(idx + 2, "multiple store headers".to_string()));
                }
                StoreLine::File(record) => {
                    inner.next_id = inner.next_id.max(record.id.0 + 1);
                    inner.rows.entry(record.id).or_default();
                    inner.files.insert(record.id, record);
                }
                StoreLine::Card(row) => inner.push_row(Row::Card(row)),
                StoreLine::Trivia(row) => inner.push_row(Row::Trivia(row)),
                StoreLine::Target(target) => inner.targets.push(target),
                StoreLine::Value { text } => inner.values.push(text),
            }
        }
        if let Some(orphan) = inner.rows.keys().find(|id| !inner.files.contains_key(*id)) {
            return Err(corrupt(0, format!("rows for unknown file {orphan}")));
        }
        inner.sort_rows();
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    /// Rewrite the store file from the in-memory contents.
    pub fn save(&self) -> Result<(), StoreError> {
        write_store(&self.path, &self.inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write `store` next to `path` and rename it into place, so a failed write
/// leaves the previous file intact.
fn write_store(path: &Path, store: &MemoryStore) -> Result<(), StoreError> {
    let mut temp_path = path.to_path_buf();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    temp_path.set_file_name(format!(".{name}.tmp"));

    let written = write_lines(&temp_path, store);
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    fs::rename(&temp_path, path).map_err(|err| {
        let _ = fs::remove_file(&temp_path);
        StoreError::Io(err)
    })
}

fn write_lines(path: &Path, store: &MemoryStore) -> Result<(), StoreError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    let mut write_line = |line: &StoreLine| -> Result<(), StoreError> {
        serde_json::to_writer(&mut writer, line)?;
        writer.write_all(b"\n")?;
        Ok(())
    };
    write_line(&StoreLine::Header(store.meta.clone()))?;
    for record in store.files.values() {
        write_line(&StoreLine::File(record.clone()))?;
    }
    for rows in store.rows.values() {
        for row in rows {
            match row {
                Row::Card(card) => write_line(&StoreLine::Card(card.clone()))?,
                Row::Trivia(trivia) => write_line(&StoreLine::Trivia(trivia.clone()))?,
            }
        }
    }
    for target in &store.targets {
        write_line(&StoreLine::Target(target.clone()))?;
    }
    for text in &store.values {
        write_line(&StoreLine::Value { text: text.clone() })?;
    }
    let file = writer.into_inner().map_err(|err| StoreError::Io(err.into_error()))?;
    file.sync_all()?;
    Ok(())
}

impl CardStore for JsonlStore {
    fn meta(&self) -> &StoreMeta {
        self.inner.meta()
    }

    fn files(&self) -> Vec<FileRecord> {
        self.inner.files()
    }

    fn record(&self, id: FileId) -> Result<FileRecord, StoreError> {
        self.inner.record(id)
    }

    fn cards_for(&self, id: FileId) -> Result<Vec<CardRow>, StoreError> {
        self.inner.cards_for(id)
    }

    fn load_file(&self, id: FileId, dialect: &dyn CardDialect) -> Result<CardFile, StoreError> {
        self.inner.load_file(id, dialect)
    }

    fn targets(&self) -> ReplacementTable {
        self.inner.targets()
    }

    fn values(&self) -> ReplacementValues {
        self.inner.values()
    }

    /// Commit into a copy, write it out, and only then adopt it.
    fn commit(&mut self, changes: ChangeSet) -> Result<Vec<FileId>, StoreError> {
        let mut staged = self.inner.clone();
        let created = staged.commit(changes)?;
        write_store(&self.path, &staged)?;
        self.inner = staged;
        Ok(created)
    }
}
