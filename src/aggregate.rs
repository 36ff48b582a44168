//! Reading included files into one labeled content document.
//!
//! Reads fan out over a per-call rayon pool sized by
//! `max_concurrency`; sections are reassembled in tree order.

use std::fs::File;
use std::io::{self, Read};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::compress::compress;
use crate::errors::Warning;
use crate::extract::{ExtractError, ExtractionConfig};
use crate::tree::IncludedFile;

/// Body used for files that are not text.
pub const BINARY_PLACEHOLDER: &str = "[binary file skipped]";
/// Body used for files that could not be read.
pub const UNREADABLE_PLACEHOLDER: &str = "[unreadable file skipped]";

/// Per-file statistics for an aggregated section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    /// Section label, e.g. `project/src/main.ts`.
    pub label: String,
    /// Bytes actually read.
    pub bytes: u64,
    /// Newlines in the bytes read.
    pub lines: usize,
    /// Cut at `max_file_bytes`.
    pub truncated: bool,
    /// Skipped as non-text.
    pub binary: bool,
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    pub content: String,
    pub warnings: Vec<Warning>,
    pub files: Vec<FileStat>,
    /// Number of files cut at `max_file_bytes`.
    pub truncated_files: usize,
}

/// One rendered section plus what was learned reading it.
struct Section {
    text: String,
    stat: FileStat,
    warning: Option<Warning>,
}

/// Read, transform and concatenate files in the given order.
///
/// Each section is `--- <label> ---`, the transformed body and a blank
/// line. Returns [`ExtractError::Cancelled`] if the token fires before
/// every read has been issued.
pub fn aggregate(
    files: &[IncludedFile],
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> Result<Aggregate, ExtractError> {
    let read_all = || -> Result<Vec<Section>, ExtractError> {
        files
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return Err(ExtractError::Cancelled);
                }
                Ok(read_section(file, config))
            })
            .collect()
    };

    let threads = config.max_concurrency.max(1);
    let sections = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(read_all)?,
        Err(e) => {
            warn!("failed to build read pool, reading on the global pool: {}", e);
            read_all()?
        }
    };

    let mut out = Aggregate {
        content: String::with_capacity(sections.iter().map(|s| s.text.len()).sum()),
        ..Default::default()
    };
    for section in sections {
        out.content.push_str(&section.text);
        if section.stat.truncated {
            out.truncated_files += 1;
        }
        if let Some(warning) = section.warning {
            warn!("{}", warning);
            out.warnings.push(warning);
        }
        out.files.push(section.stat);
    }

    Ok(out)
}

fn read_section(file: &IncludedFile, config: &ExtractionConfig) -> Section {
    let max = config.max_file_bytes;
    let mut stat = FileStat {
        label: file.label.clone(),
        bytes: 0,
        lines: 0,
        truncated: false,
        binary: false,
    };

    let (body, warning) = match read_capped(file, max) {
        Err(e) => (
            UNREADABLE_PLACEHOLDER.to_string(),
            Some(Warning::unreadable(&file.path, e)),
        ),
        Ok((bytes, truncated)) => {
            stat.bytes = bytes.len() as u64;
            stat.lines = bytecount::count(&bytes, b'\n');
            stat.truncated = truncated;
            match decode(&bytes, truncated) {
                Some(text) => {
                    let mut body = compress(text, config.compression_level);
                    if truncated {
                        if !body.is_empty() && !body.ends_with('\n') {
                            body.push('\n');
                        }
                        body.push_str(&truncation_marker(&file.label, max));
                    }
                    (body, None)
                }
                None => {
                    debug!(path = %file.path.display(), "not valid text");
                    stat.binary = true;
                    (
                        BINARY_PLACEHOLDER.to_string(),
                        Some(Warning::DecodeFailure {
                            path: file.path.clone(),
                        }),
                    )
                }
            }
        }
    };

    let mut text = String::with_capacity(body.len() + file.label.len() + 10);
    text.push_str("--- ");
    text.push_str(&file.label);
    text.push_str(" ---\n");
    text.push_str(&body);
    if !body.is_empty() && !body.ends_with('\n') {
        text.push('\n');
    }
    text.push('\n');

    Section {
        text,
        stat,
        warning,
    }
}

fn truncation_marker(label: &str, max: u64) -> String {
    format!("[... truncated: {} exceeds {} bytes ...]", label, max)
}

/// Upper bound on the bytes a file's section adds to the content.
///
/// Covers the header, the body (capped, or a placeholder), its line
/// terminator, the truncation marker when `size > max_file_bytes`, and
/// the blank separator. Compression never grows a body beyond one added
/// trailing newline.
pub(crate) fn section_len(label: &str, size: u64, max_file_bytes: u64) -> u64 {
    let label = label.len() as u64;
    let header = label + "--- ".len() as u64 + " ---\n".len() as u64;
    let placeholder = BINARY_PLACEHOLDER.len().max(UNREADABLE_PLACEHOLDER.len()) as u64;
    let body = size.min(max_file_bytes).max(placeholder) + 1;
    let marker = if size > max_file_bytes {
        truncation_marker("", max_file_bytes).len() as u64 + label + 1
    } else {
        0
    };
    header + body + marker + 1
}

/// Read at most `max` bytes. The flag reports whether more were available.
fn read_capped(file: &IncludedFile, max: u64) -> io::Result<(Vec<u8>, bool)> {
    let mut bytes = Vec::new();
    File::open(&file.path)?
        .take(max.saturating_add(1))
        .read_to_end(&mut bytes)?;

    let cap = usize::try_from(max).unwrap_or(usize::MAX);
    let truncated = bytes.len() > cap;
    bytes.truncate(cap);
    Ok((bytes, truncated))
}

/// Decode as UTF-8. A cut file may end mid-character; that tail is dropped.
fn decode(bytes: &[u8], truncated: bool) -> Option<&str> {
    if bytes.contains(&0) {
        return None;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&bytes[..e.valid_up_to()]).ok()
        }
        Err(_) => None,
    }
}
