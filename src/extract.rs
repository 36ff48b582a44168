//! Extraction orchestration.
//!
//! Ties the walker, renderer, aggregator and counter together into a
//! single call that returns one [`ExtractionResult`].

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::aggregate::{aggregate, Aggregate, FileStat};
use crate::cancel::CancellationToken;
use crate::clipboard::{ClipboardError, ClipboardSink};
use crate::compress::CompressionLevel;
use crate::errors::Warning;
use crate::filter::FileTypeSet;
use crate::tokens::{count_with, TokenEstimator};
use crate::tree::render_tree;
use crate::walker::walk;

/// Default per-file read cap: 1 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;
/// Default total byte budget: 8 MiB.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 8 * 1024 * 1024;
/// Default number of concurrent file reads.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Errors that abort an extraction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("none of the {requested} selected path(s) could be resolved")]
    EmptySelection { requested: usize },

    #[error("extraction cancelled")]
    Cancelled,
}

/// Per-invocation options. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub file_types: FileTypeSet,
    pub compression_level: CompressionLevel,
    /// Bytes read from any single file.
    pub max_file_bytes: u64,
    /// Upper bound on the aggregated content, headers included.
    pub max_total_bytes: u64,
    /// Concurrent file reads.
    pub max_concurrency: usize,
    /// Honour `.gitignore` files found during the walk.
    pub respect_gitignore: bool,
    pub token_estimator: TokenEstimator,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            file_types: FileTypeSet::default(),
            compression_level: CompressionLevel::default(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            respect_gitignore: false,
            token_estimator: TokenEstimator::default(),
        }
    }
}

/// What an extraction produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Tree text only.
    TreeOnly,
    /// Tree text and aggregated file contents.
    #[default]
    Full,
}

/// Which byte limits were hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Truncation {
    /// The total budget excluded at least one file.
    pub total_bytes: bool,
    /// At least one file was cut at `max_file_bytes`.
    pub file_bytes: bool,
}

/// The single value returned by [`extract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub tree_text: String,
    /// Empty in tree-only mode or when nothing matched.
    pub content_text: String,
    pub token_count: usize,
    pub char_count: usize,
    pub truncated: bool,
    pub truncation: Truncation,
    pub warnings: Vec<Warning>,
    pub files: Vec<FileStat>,
}

impl ExtractionResult {
    /// Tree and content joined the way they are counted and delivered.
    pub fn combined(&self) -> String {
        if self.content_text.is_empty() {
            return self.tree_text.clone();
        }
        let mut out = String::with_capacity(self.tree_text.len() + self.content_text.len() + 1);
        out.push_str(&self.tree_text);
        out.push('\n');
        out.push_str(&self.content_text);
        out
    }
}

/// Run one extraction over the selected paths.
///
/// # Examples
///
/// ```no_run
/// use ctxpack::cancel::CancellationToken;
/// use ctxpack::extract::{extract, ExtractMode, ExtractionConfig};
/// use std::path::PathBuf;
///
/// let result = extract(
///     &[PathBuf::from("./project")],
///     &ExtractionConfig::default(),
///     ExtractMode::Full,
///     &CancellationToken::new(),
/// )
/// .unwrap();
/// println!("{}", result.combined());
/// ```
pub fn extract(
    root_paths: &[PathBuf],
    config: &ExtractionConfig,
    mode: ExtractMode,
    cancel: &CancellationToken,
) -> Result<ExtractionResult, ExtractError> {
    let span = info_span!("extract", roots = root_paths.len(), ?mode);
    let _guard = span.enter();
    let started = Instant::now();

    let outcome = walk(root_paths, config, cancel)?;
    let included = outcome.included_file_count();

    let mut warnings = outcome.warnings;
    if included == 0 {
        warn!("{}", Warning::NoMatchingFiles);
        warnings.push(Warning::NoMatchingFiles);
    }

    let (tree_text, aggregated) = if mode == ExtractMode::Full && included > 0 {
        let files: Vec<_> = outcome
            .roots
            .iter()
            .flat_map(|root| root.included_files())
            .collect();
        let (tree_text, aggregated) = rayon::join(
            || render_tree(&outcome.roots),
            || aggregate(&files, config, cancel),
        );
        (tree_text, aggregated?)
    } else {
        (render_tree(&outcome.roots), Aggregate::default())
    };

    if cancel.is_cancelled() {
        return Err(ExtractError::Cancelled);
    }

    warnings.extend(aggregated.warnings);
    let content_text = aggregated.content;

    let result = ExtractionResult {
        truncated: outcome.truncated || aggregated.truncated_files > 0,
        truncation: Truncation {
            total_bytes: outcome.truncated,
            file_bytes: aggregated.truncated_files > 0,
        },
        tree_text,
        content_text,
        token_count: 0,
        char_count: 0,
        warnings,
        files: aggregated.files,
    };
    let counts = count_with(&result.combined(), config.token_estimator);
    let result = ExtractionResult {
        token_count: counts.tokens,
        char_count: counts.chars,
        ..result
    };

    info!(
        included_files = included,
        bytes = result.files.iter().map(|f| f.bytes).sum::<u64>(),
        tokens = result.token_count,
        warnings = result.warnings.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "extraction finished"
    );

    Ok(result)
}

/// Deliver the combined text of a result to a clipboard.
pub fn copy_to_clipboard(
    result: &ExtractionResult,
    sink: &dyn ClipboardSink,
) -> Result<(), ClipboardError> {
    sink.copy(&result.combined())
}
