//! File tree representation and rendering.
//!
//! Provides the node type produced by the walker and the renderer that
//! turns it into a classic box-drawing tree.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A node in the extracted tree.
///
/// Nodes are built by the walker and are read-only afterwards: children
/// are only reachable through [`TreeNode::children`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Absolute path on disk.
    pub absolute_path: PathBuf,
    /// File or directory name shown in the tree.
    pub display_name: String,
    /// Whether this node is a directory.
    pub is_directory: bool,
    /// File passes the filter and budget, or directory has such a descendant.
    pub included: bool,
    /// Size in bytes, for files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a file node.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        size: u64,
        included: bool,
    ) -> Self {
        Self {
            absolute_path: path.into(),
            display_name: name.into(),
            is_directory: false,
            included,
            size: Some(size),
            children: Vec::new(),
        }
    }

    /// Create a directory node. Children are sorted and `included` is
    /// derived from them.
    pub fn directory(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        mut children: Vec<TreeNode>,
    ) -> Self {
        children.sort_by(compare_nodes);
        let included = children.iter().any(|c| c.included);
        Self {
            absolute_path: path.into(),
            display_name: name.into(),
            is_directory: true,
            included,
            size: None,
            children,
        }
    }

    /// Child nodes, directories first then files, each alphabetical.
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Drop all children, keeping the node itself.
    pub(crate) fn into_bare(mut self) -> Self {
        self.children.clear();
        self.included = false;
        self
    }

    /// Count included files in this subtree.
    pub fn included_file_count(&self) -> usize {
        if self.is_directory {
            self.children.iter().map(|c| c.included_file_count()).sum()
        } else {
            usize::from(self.included)
        }
    }

    /// Count all listed files in this subtree.
    pub fn file_count(&self) -> usize {
        if self.is_directory {
            self.children.iter().map(|c| c.file_count()).sum()
        } else {
            1
        }
    }

    /// Collect included files in depth-first tree order.
    ///
    /// Each file is paired with a `/`-separated label that starts at this
    /// node's display name, e.g. `project/src/main.ts`.
    pub fn included_files(&self) -> Vec<IncludedFile> {
        let mut out = Vec::new();
        collect_included(self, "", &mut out);
        out
    }
}

/// An included file, ready for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path shown in the section header.
    pub label: String,
}

impl IncludedFile {
    pub fn new(path: impl AsRef<Path>, label: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            label: label.into(),
        }
    }
}

fn collect_included(node: &TreeNode, parent: &str, out: &mut Vec<IncludedFile>) {
    if !node.included {
        return;
    }

    let label = if parent.is_empty() {
        node.display_name.clone()
    } else {
        format!("{}/{}", parent, node.display_name)
    };

    if node.is_directory {
        for child in &node.children {
            collect_included(child, &label, out);
        }
    } else {
        out.push(IncludedFile {
            path: node.absolute_path.clone(),
            label,
        });
    }
}

fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    compare_entries(a.is_directory, &a.display_name, b.is_directory, &b.display_name)
}

/// Directories first, then case-insensitive name, then exact name.
pub(crate) fn compare_entries(a_dir: bool, a_name: &str, b_dir: bool, b_name: &str) -> Ordering {
    match (a_dir, b_dir) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a_name
            .to_lowercase()
            .cmp(&b_name.to_lowercase())
            .then_with(|| a_name.cmp(b_name)),
    }
}

/// Box-drawing characters for tree rendering.
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render root nodes to a string with box-drawing characters.
///
/// # Examples
///
/// ```
/// use ctxpack::tree::{render_tree, TreeNode};
///
/// let root = TreeNode::directory(
///     "project",
///     "/tmp/project",
///     vec![TreeNode::file("main.ts", "/tmp/project/main.ts", 12, true)],
/// );
///
/// assert_eq!(render_tree(&[root]), "project/\n└── main.ts\n");
/// ```
pub fn render_tree(roots: &[TreeNode]) -> String {
    // Pre-allocate for typical tree size
    let mut output = String::with_capacity(4096);
    for root in roots {
        render_node(&mut output, root, "", true, true);
    }
    output
}

fn render_node(output: &mut String, node: &TreeNode, prefix: &str, is_last: bool, is_root: bool) {
    let branch = if is_root {
        ""
    } else if is_last {
        LAST_BRANCH
    } else {
        BRANCH
    };

    output.push_str(prefix);
    output.push_str(branch);
    output.push_str(&node.display_name);
    if node.is_directory {
        output.push('/');
    }
    output.push('\n');

    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last_child = i == child_count - 1;

        let new_prefix = if is_root {
            String::new()
        } else {
            let continuation = if is_last { SPACE } else { VERTICAL };
            format!("{}{}", prefix, continuation)
        };

        render_node(output, child, &new_prefix, is_last_child, false);
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
