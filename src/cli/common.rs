//! Shared clap helper types for CLI commands.

use cardfile::{FileKind, Rename};
use clap::ValueEnum;

/// File kind override accepted by commands that read a single file.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FileKindArg {
    Project,
    MappingTable,
    StreamNetwork,
    Generic,
}

impl From<FileKindArg> for FileKind {
    fn from(value: FileKindArg) -> FileKind {
        match value {
            FileKindArg::Project => FileKind::Project,
            FileKindArg::MappingTable => FileKind::MappingTable,
            FileKindArg::StreamNetwork => FileKind::StreamNetwork,
            FileKindArg::Generic => FileKind::Generic,
        }
    }
}

/// Clap-friendly parser for `OLD=NEW` prefix renames.
pub fn parse_rename(input: &str) -> Result<Rename, String> {
    Rename::parse(input).ok_or_else(|| "rename must be OLD=NEW".to_string())
}
