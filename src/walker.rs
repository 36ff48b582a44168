//! Directory traversal into a filtered, budgeted tree.
//!
//! Each directory is listed one level at a time with the `ignore` crate
//! so `.gitignore` files can optionally be honoured. Recursion, sorting,
//! symlink de-duplication and the byte budget are handled here, in tree
//! order, which keeps the output reproducible across runs and platforms.

use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::aggregate::section_len;
use crate::cancel::CancellationToken;
use crate::errors::Warning;
use crate::extract::{ExtractError, ExtractionConfig};
use crate::filter::{is_ignored, should_include};
use crate::tree::{compare_entries, TreeNode};

/// Result of walking a selection.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// One root per distinct, resolvable selected path.
    pub roots: Vec<TreeNode>,
    /// Soft problems met along the way.
    pub warnings: Vec<Warning>,
    /// The total byte budget excluded at least one file.
    pub truncated: bool,
}

impl WalkOutcome {
    /// Number of included files across all roots.
    pub fn included_file_count(&self) -> usize {
        self.roots.iter().map(TreeNode::included_file_count).sum()
    }
}

/// Cumulative byte budget for files queued for inclusion.
#[derive(Debug, Clone)]
struct ByteBudget {
    max: u64,
    used: u64,
    exhausted: bool,
}

impl ByteBudget {
    fn new(max: u64) -> Self {
        Self {
            max,
            used: 0,
            exhausted: false,
        }
    }

    /// Charge a file. Once a charge would overflow, every later charge
    /// fails too.
    fn charge(&mut self, bytes: u64) -> bool {
        if self.exhausted {
            return false;
        }
        match self.used.checked_add(bytes) {
            Some(total) if total <= self.max => {
                self.used = total;
                true
            }
            _ => {
                self.exhausted = true;
                false
            }
        }
    }
}

/// A directory entry that has been stat'ed and is ready to be sorted.
struct Entry {
    name: String,
    path: PathBuf,
    metadata: Metadata,
}

/// Walk the selected paths into one tree root per path.
///
/// Fails only when no path resolves ([`ExtractError::EmptySelection`])
/// or the token is cancelled.
///
/// # Examples
///
/// ```no_run
/// use ctxpack::cancel::CancellationToken;
/// use ctxpack::extract::ExtractionConfig;
/// use ctxpack::walker::walk;
/// use std::path::PathBuf;
///
/// let outcome = walk(
///     &[PathBuf::from("./project")],
///     &ExtractionConfig::default(),
///     &CancellationToken::new(),
/// )
/// .unwrap();
/// println!("{} files included", outcome.included_file_count());
/// ```
pub fn walk(
    root_paths: &[PathBuf],
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> Result<WalkOutcome, ExtractError> {
    let mut walker = Walker {
        config,
        cancel,
        visited: HashSet::new(),
        warnings: Vec::new(),
        budget: ByteBudget::new(config.max_total_bytes),
    };

    let mut roots = Vec::with_capacity(root_paths.len());
    for path in root_paths {
        if let Some(root) = walker.walk_root(path)? {
            roots.push(root);
        }
    }

    if roots.is_empty() {
        return Err(ExtractError::EmptySelection {
            requested: root_paths.len(),
        });
    }

    Ok(WalkOutcome {
        roots,
        warnings: walker.warnings,
        truncated: walker.budget.exhausted,
    })
}

struct Walker<'a> {
    config: &'a ExtractionConfig,
    cancel: &'a CancellationToken,
    /// Real paths already emitted during this walk.
    visited: HashSet<PathBuf>,
    warnings: Vec<Warning>,
    budget: ByteBudget,
}

impl Walker<'_> {
    fn walk_root(&mut self, path: &Path) -> Result<Option<TreeNode>, ExtractError> {
        let (real, metadata) = match fs::canonicalize(path).and_then(|real| {
            let metadata = fs::metadata(&real)?;
            Ok((real, metadata))
        }) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.warn(Warning::unreadable(path, e));
                return Ok(None);
            }
        };

        if !self.visited.insert(real.clone()) {
            self.warn(Warning::DuplicateRoot {
                path: path.to_path_buf(),
            });
            return Ok(None);
        }

        let name = real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| real.display().to_string());

        if !metadata.is_dir() {
            let label = name.clone();
            return Ok(Some(self.file_node(name, real, &metadata, &label)));
        }

        if is_ignored(&real, true) {
            debug!(path = %real.display(), "selected directory is in the ignore set");
            return Ok(Some(TreeNode::directory(name, real, Vec::new())));
        }

        let label = name.clone();
        let node = self.walk_dir(name, real, &label)?;
        if node.included {
            Ok(Some(node))
        } else {
            Ok(Some(node.into_bare()))
        }
    }

    /// `label` is this directory's section-label prefix, e.g. `project/src`.
    fn walk_dir(
        &mut self,
        name: String,
        dir: PathBuf,
        label: &str,
    ) -> Result<TreeNode, ExtractError> {
        if self.cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        let mut children = Vec::new();
        for entry in self.list_dir(&dir) {
            let is_dir = entry.metadata.is_dir();
            if !is_dir && !entry.metadata.is_file() {
                continue;
            }
            if is_ignored(&entry.path, is_dir) {
                debug!(path = %entry.path.display(), "skipping ignored entry");
                continue;
            }
            let Some(real) = self.first_visit(&entry.path) else {
                continue;
            };
            // A link is judged by its target too: `deps -> node_modules` stays out.
            if is_ignored(&real, is_dir) {
                debug!(path = %entry.path.display(), real = %real.display(), "link target is ignored");
                continue;
            }

            let child_label = format!("{}/{}", label, entry.name);
            if is_dir {
                let child = self.walk_dir(entry.name, real, &child_label)?;
                // Directories without included descendants are pruned.
                if child.included {
                    children.push(child);
                }
            } else {
                children.push(self.file_node(entry.name, entry.path, &entry.metadata, &child_label));
            }
        }

        Ok(TreeNode::directory(name, dir, children))
    }

    /// Files are charged the upper bound of their rendered section, so the
    /// aggregated content never exceeds `max_total_bytes`.
    fn file_node(&mut self, name: String, path: PathBuf, metadata: &Metadata, label: &str) -> TreeNode {
        let size = metadata.len();
        let included = should_include(&path, false, self.config)
            && self
                .budget
                .charge(section_len(label, size, self.config.max_file_bytes));
        TreeNode::file(name, path, size, included)
    }

    /// List one directory level, stat'ed and sorted in tree order.
    fn list_dir(&mut self, dir: &Path) -> Vec<Entry> {
        let mut builder = WalkBuilder::new(dir);
        builder
            .standard_filters(false)
            .max_depth(Some(1))
            .follow_links(false);

        if self.config.respect_gitignore {
            builder
                .git_ignore(true)
                .git_exclude(true)
                .git_global(true)
                .parents(true)
                .require_git(false);
        }

        let mut entries = Vec::new();
        for result in builder.build() {
            let dir_entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    self.warn(Warning::unreadable(dir, e));
                    continue;
                }
            };
            if dir_entry.depth() == 0 {
                continue;
            }

            let path = dir_entry.into_path();
            // Follows symlinks, so links are typed by their targets.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    self.warn(Warning::unreadable(&path, e));
                    continue;
                }
            };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            entries.push(Entry {
                name,
                path,
                metadata,
            });
        }

        entries.sort_by(|a, b| {
            compare_entries(a.metadata.is_dir(), &a.name, b.metadata.is_dir(), &b.name)
        });
        entries
    }

    /// Resolve a path and claim it. `None` if unresolvable or already seen.
    fn first_visit(&mut self, path: &Path) -> Option<PathBuf> {
        let real = match fs::canonicalize(path) {
            Ok(real) => real,
            Err(e) => {
                self.warn(Warning::unreadable(path, e));
                return None;
            }
        };
        if !self.visited.insert(real.clone()) {
            debug!(path = %path.display(), real = %real.display(), "already visited");
            return None;
        }
        Some(real)
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}
