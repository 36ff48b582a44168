//! Path filtering: the fixed ignore set and the file-type allow-list.
//!
//! Two questions are answered here. Is an entry *ignored* (never listed,
//! never descended, never read)? And is a file *included* (its suffix is
//! in the configured [`FileTypeSet`])? Ignored entries vanish from the
//! tree; excluded files are still listed, just not aggregated.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::ExtractionConfig;

/// Errors that can occur while building a file-type set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid file-type suffix: {0:?}")]
    InvalidSuffix(String),
}

/// Directories that are never descended into.
const IGNORED_DIRS: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    // Dependencies and package caches
    "node_modules",
    "bower_components",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".gradle",
    ".cargo",
    "vendor",
    // Build output
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    ".output",
    "coverage",
    // Editor state
    ".idea",
    ".vscode",
    ".vs",
];

/// Files that are never listed, matched by exact name.
const IGNORED_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "composer.lock",
    "poetry.lock",
    "Gemfile.lock",
    ".DS_Store",
    "Thumbs.db",
];

/// Suffixes of binary formats that are never listed.
const BINARY_SUFFIXES: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".ico", ".pdf", ".zip", ".gz", ".tar", ".jar", ".class",
    ".exe", ".dll", ".so", ".dylib", ".o", ".a", ".wasm", ".pyc", ".woff", ".woff2", ".ttf",
    ".mp3", ".mp4", ".sqlite", ".db",
];

/// Suffixes enabled when no preference has been stored yet.
const DEFAULT_FILE_TYPES: &[&str] = &[
    ".rs", ".ts", ".tsx", ".js", ".jsx", ".py", ".go", ".java", ".c", ".h", ".cpp", ".cs", ".rb",
    ".php", ".md", ".json", ".toml", ".yaml", ".yml", ".html", ".css", ".sh",
];

/// A set of lower-cased, dot-prefixed file suffixes such as `.ts`.
///
/// Entries can only enter through [`FileTypeSet::insert`] (or parsing),
/// which normalizes them, so every member satisfies the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FileTypeSet {
    suffixes: BTreeSet<String>,
}

impl FileTypeSet {
    /// An empty set. Nothing will be included.
    pub fn new() -> Self {
        Self {
            suffixes: BTreeSet::new(),
        }
    }

    /// Normalize a user-supplied suffix: trim, lower-case, add the dot.
    ///
    /// ```
    /// use ctxpack::filter::FileTypeSet;
    ///
    /// assert_eq!(FileTypeSet::normalize(" TS ").unwrap(), ".ts");
    /// assert!(FileTypeSet::normalize(".").is_err());
    /// ```
    pub fn normalize(raw: &str) -> Result<String, FilterError> {
        let trimmed = raw.trim();
        let bare = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if bare.is_empty() || bare.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
            return Err(FilterError::InvalidSuffix(raw.to_string()));
        }
        Ok(format!(".{}", bare.to_lowercase()))
    }

    /// Add a suffix. Returns whether it was newly inserted.
    pub fn insert(&mut self, raw: &str) -> Result<bool, FilterError> {
        let suffix = Self::normalize(raw)?;
        Ok(self.suffixes.insert(suffix))
    }

    /// Remove a suffix. Returns whether it was present.
    pub fn remove(&mut self, raw: &str) -> bool {
        match Self::normalize(raw) {
            Ok(suffix) => self.suffixes.remove(&suffix),
            Err(_) => false,
        }
    }

    /// Check membership of an already-normalized or raw suffix.
    pub fn contains(&self, raw: &str) -> bool {
        Self::normalize(raw)
            .map(|s| self.suffixes.contains(&s))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Iterate suffixes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }
}

impl Default for FileTypeSet {
    fn default() -> Self {
        let suffixes = DEFAULT_FILE_TYPES.iter().map(|s| s.to_string()).collect();
        Self { suffixes }
    }
}

impl fmt::Display for FileTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(","))
    }
}

impl FromStr for FileTypeSet {
    type Err = FilterError;

    /// Parse a comma-separated list such as `ts,.md, .RS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = FileTypeSet::new();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            set.insert(part)?;
        }
        Ok(set)
    }
}

impl TryFrom<Vec<String>> for FileTypeSet {
    type Error = FilterError;

    fn try_from(raw: Vec<String>) -> Result<Self, Self::Error> {
        let mut set = FileTypeSet::new();
        for suffix in &raw {
            set.insert(suffix)?;
        }
        Ok(set)
    }
}

impl From<FileTypeSet> for Vec<String> {
    fn from(set: FileTypeSet) -> Self {
        set.suffixes.into_iter().collect()
    }
}

/// Lower-cased, dot-prefixed suffix of a path, if it has one.
///
/// Dotfiles such as `.gitignore` have no suffix.
pub fn suffix_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Whether an entry belongs to the fixed ignore set.
///
/// Ignored directories are never descended; ignored files are never listed.
pub fn is_ignored(path: &Path, is_directory: bool) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };

    if is_directory {
        return IGNORED_DIRS.contains(&name);
    }

    if IGNORED_FILES.contains(&name) {
        return true;
    }

    suffix_of(path).is_some_and(|s| BINARY_SUFFIXES.contains(&s.as_str()))
}

/// Decide whether a path takes part in an extraction.
///
/// Directories are included unless ignored. Files must additionally
/// carry a suffix from `config.file_types`.
pub fn should_include(path: &Path, is_directory: bool, config: &ExtractionConfig) -> bool {
    if is_ignored(path, is_directory) {
        return false;
    }
    if is_directory {
        return true;
    }
    suffix_of(path).is_some_and(|s| config.file_types.contains(&s))
}
