//! Relative path handling and project prefix renaming for path-valued cards.

/// Old and new project prefix applied to file names on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

impl Rename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Parse `OLD=NEW`.
    pub fn parse(input: &str) -> Option<Self> {
        let (from, to) = input.split_once('=')?;
        if from.is_empty() || to.is_empty() {
            return None;
        }
        Some(Self::new(from, to))
    }

    /// Rename a bare file name that follows the project naming convention.
    ///
    /// `old.ext` becomes `new.ext`, `old_prj.pro` becomes `new_prj.pro` and
    /// `oldSuffix.ext` becomes `newSuffix.ext`; other names are unchanged.
    pub fn apply(&self, filename: &str) -> String {
        let (stem, extension) = match filename.split_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (filename, None),
        };
        let Some(suffix) = stem.strip_prefix(self.from.as_str()) else {
            return filename.to_string();
        };
        match extension {
            Some(ext) => format!("{}{}.{}", self.to, suffix, ext),
            None => format!("{}{}", self.to, suffix),
        }
    }
}

/// Last component of a path, ignoring trailing separators.
pub fn relative(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
}

fn is_number(text: &str) -> bool {
    text.parse::<f64>().is_ok()
}

/// Heuristic for values naming a file or directory: anything with a path
/// separator, or a non-numeric name with an extension.
pub fn is_path_like(text: &str) -> bool {
    if text.is_empty() || is_number(text) {
        return false;
    }
    if text.contains(['/', '\\']) {
        return true;
    }
    text.contains('.') && !text.starts_with('.') && !text.ends_with('.')
}
