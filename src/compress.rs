//! Text compression tiers applied to file contents before aggregation.
//!
//! "Compression" here means whitespace and comment stripping on decoded
//! text, never byte-level compression. Every level is idempotent.
//!
//! The comment heuristic used by [`CompressionLevel::Full`] is
//! language-agnostic and deliberately conservative:
//!
//! - `/* ... */` block comments are removed, even across lines. A
//!   single-line block comment becomes one space; a multi-line one is
//!   replaced by the newlines it contained so line structure survives.
//! - `//` starts a line comment only at the start of a line or after
//!   whitespace, so `http://example.com` is left alone. The cost is that
//!   a spaced `//` operator is taken for a comment: Python's `a // b`
//!   loses `// b`. Use Light or None for Python sources.
//! - `"`, `'` and `` ` `` open a string literal only when a matching
//!   closing quote exists later on the same line; backslash escapes are
//!   honoured. Comment markers inside strings are kept.
//! - `#` comments are not touched: they collide with markdown headings,
//!   C preprocessor directives and Rust attributes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How aggressively file contents are compacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Verbatim text.
    #[default]
    None,
    /// Trailing whitespace trimmed, blank-line runs collapsed.
    Light,
    /// Light plus comment stripping.
    Full,
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionLevel::None => write!(f, "none"),
            CompressionLevel::Light => write!(f, "light"),
            CompressionLevel::Full => write!(f, "full"),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CompressionLevel::None),
            "light" => Ok(CompressionLevel::Light),
            "full" => Ok(CompressionLevel::Full),
            _ => Err(format!("unknown compression level: {}", s)),
        }
    }
}

/// Apply a compression level to text.
///
/// # Examples
///
/// ```
/// use ctxpack::compress::{compress, CompressionLevel};
///
/// let src = "let a = 1; // one\n\n\n\nlet b = 2;   \n";
/// assert_eq!(compress(src, CompressionLevel::Light), "let a = 1; // one\n\nlet b = 2;\n");
/// assert_eq!(compress(src, CompressionLevel::Full), "let a = 1;\n\nlet b = 2;\n");
/// ```
pub fn compress(text: &str, level: CompressionLevel) -> String {
    match level {
        CompressionLevel::None => text.to_string(),
        CompressionLevel::Light => collapse_whitespace(text),
        CompressionLevel::Full => collapse_whitespace(&strip_comments(text)),
    }
}

/// Trim trailing whitespace, collapse blank-line runs to one, drop
/// leading and trailing blank lines.
fn collapse_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            pending_blank = !output.is_empty();
            continue;
        }
        if pending_blank {
            output.push('\n');
            pending_blank = false;
        }
        output.push_str(line);
        output.push('\n');
    }

    output
}

/// Remove comments according to the module-level heuristic.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if matches!(c, '"' | '\'' | '`') {
            if let Some(end) = closing_quote(&chars, i) {
                output.extend(&chars[i..=end]);
                i = end + 1;
                continue;
            }
            output.push(c);
            i += 1;
            continue;
        }

        if c == '/' && next == Some('*') {
            let end = block_comment_end(&chars, i + 2);
            let newlines = chars[i..end].iter().filter(|&&ch| ch == '\n').count();
            if newlines == 0 {
                output.push(' ');
            } else {
                output.extend(std::iter::repeat('\n').take(newlines));
            }
            i = end;
            continue;
        }

        if c == '/' && next == Some('/') && at_token_boundary(&output) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        output.push(c);
        i += 1;
    }

    output
}

/// Index of the matching closing quote on the same line, if any.
fn closing_quote(chars: &[char], open: usize) -> Option<usize> {
    let quote = chars[open];
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\n' => return None,
            '\\' if chars.get(i + 1) == Some(&'\n') => return None,
            '\\' => i += 2,
            c if c == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Index just past the `*/` closing a block comment, or the end of input.
fn block_comment_end(chars: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// A `//` only opens a comment at line start or after whitespace.
fn at_token_boundary(output: &str) -> bool {
    output.chars().next_back().map_or(true, char::is_whitespace)
}
