//! Round-trip transcoder for card-based model files with replacement
//! parameters.

mod card;
mod cardfile;
mod config;
mod dialect;
mod error;
mod lexer;
mod paths;
mod project;
mod replace;
mod store;

pub use card::{Card, CardValue, Line, negative_id};
pub use cardfile::{CardFile, ParseOptions, Serialized, WriteOptions, split_filename};
pub use config::Settings;
pub use dialect::{
    Alignment, CardDialect, ConfiguredDialect, DialectRules, FileKind, IncludeKind, IncludeRule,
};
pub use error::{Parsed, TranscodeError, TranscodeWarning};
pub use paths::{Rename, is_path_like, relative};
pub use project::{Project, read_card_file, read_targets};
pub use replace::{
    ReplacementTable, ReplacementTarget, ReplacementValues, TargetId, TargetKind,
    looks_like_token,
};
pub use store::{
    CardRow, CardStore, ChangeSet, FileId, FileRecord, JsonlStore, MemoryStore, ProjectInfo,
    StoreError, StoreMeta, TriviaRow,
};
