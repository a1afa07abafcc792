use std::path::PathBuf;

use thiserror::Error;

/// Hard failures raised while transcoding a card file.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("malformed card on line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
    #[error("malformed replacement parameter on line {line}: {reason}")]
    MalformedParameter { line: usize, reason: String },
    #[error("no card named '{0}'")]
    CardNotFound(String),
    #[error("no replacement target named '{0}'")]
    UnknownTarget(String),
    #[error("card '{card}' holds an item count and cannot take a replacement parameter")]
    CountCard { card: String },
    #[error("{kind} files do not support replacement parameters")]
    ReplacementUnsupported { kind: String },
}

/// Recoverable anomalies. Each is logged and handled by a fallback rather
/// than aborting the read or write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeWarning {
    /// A card names a file that is not on disk; the include is skipped.
    #[error("card {card} references missing file {}", path.display())]
    MissingReferencedFile { card: String, path: PathBuf },
    /// A replacement reference could not be mapped to a known target; the
    /// literal text is kept.
    #[error("card {card}: unresolved replacement reference {reference}")]
    UnresolvedReplacementReference { card: String, reference: String },
    /// A count card was given a replacement token; it stays a literal.
    #[error("card {card} holds an item count; replacement {value} ignored")]
    UnsupportedReplacementContext { card: String, value: String },
    #[error("replacement parameter file declares {declared} parameters but lists {found}")]
    ParameterCountMismatch { declared: usize, found: usize },
}

impl TranscodeWarning {
    /// Emit the warning through `tracing`.
    pub fn log(&self) {
        tracing::warn!("{self}");
    }
}

/// A value together with the warnings collected while producing it.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub value: T,
    pub warnings: Vec<TranscodeWarning>,
}

impl<T> Parsed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn warn(&mut self, warning: TranscodeWarning) {
        warning.log();
        self.warnings.push(warning);
    }
}
