//! ctxpack - Pack selected files and folders into LLM prompt context.
//!
//! ctxpack walks the selected paths, renders a directory tree, concatenates
//! the contents of matching files under path headers (optionally with
//! whitespace and comment stripping) and reports character and token
//! counts for the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use ctxpack::{extract, CancellationToken, ExtractMode, ExtractionConfig};
//! use std::path::PathBuf;
//!
//! let config = ExtractionConfig {
//!     file_types: ".rs,.md".parse().unwrap(),
//!     ..Default::default()
//! };
//! let result = extract(
//!     &[PathBuf::from("./my-project")],
//!     &config,
//!     ExtractMode::Full,
//!     &CancellationToken::new(),
//! )
//! .unwrap();
//!
//! println!("{}", result.combined());
//! println!("~{} tokens, {} chars", result.token_count, result.char_count);
//! ```
//!
//! # Modules
//!
//! - [`filter`] - Ignore set and file-type allow-list
//! - [`walker`] - Directory traversal into a filtered tree
//! - [`tree`] - Tree nodes and box-drawing rendering
//! - [`compress`] - None/Light/Full text compaction
//! - [`aggregate`] - Concurrent file reads into labeled sections
//! - [`tokens`] - Character and token counting
//! - [`extract`] - Extraction orchestration and clipboard delivery
//! - [`settings`] - Persisted user settings
//! - [`detect`] - Workspace file-type detection
//! - [`clipboard`] - System clipboard sink
//! - [`session`] - Request/response boundary for hosts

pub mod aggregate;
pub mod cancel;
pub mod clipboard;
pub mod compress;
pub mod detect;
pub mod errors;
pub mod extract;
pub mod filter;
pub mod session;
pub mod settings;
pub mod tokens;
pub mod tree;
pub mod walker;

// Re-export key types at crate root for convenience
pub use cancel::CancellationToken;
pub use clipboard::{ClipboardError, ClipboardSink, SystemClipboard};
pub use compress::{compress, CompressionLevel};
pub use errors::{CtxError, Warning};
pub use extract::{
    copy_to_clipboard, extract, ExtractError, ExtractMode, ExtractionConfig, ExtractionResult,
};
pub use filter::{should_include, FileTypeSet, FilterError};
pub use session::{Request, Response, Session};
pub use settings::{ConfigStore, JsonFileStore, MemoryStore, Settings, SettingsError};
pub use tokens::{count, Counts, TokenEstimator};
pub use tree::{render_tree, TreeNode};
