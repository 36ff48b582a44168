//! Host-facing request/response boundary.
//!
//! A [`Session`] owns the settings store and the token of the extraction
//! in flight. Hosts (an editor panel, the CLI) send [`Request`]s and get
//! back [`Response`]s; there is no global state.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::clipboard::ClipboardSink;
use crate::compress::CompressionLevel;
use crate::errors::CtxError;
use crate::extract::{copy_to_clipboard, extract, ExtractMode, ExtractionResult};
use crate::filter::FileTypeSet;
use crate::settings::{ConfigStore, Settings};
use crate::tokens::{count, Counts};

/// A message from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Extract the given paths using the stored settings.
    Extract { paths: Vec<PathBuf>, mode: ExtractMode },
    /// Extract, then deliver the combined text to the clipboard.
    CopyToClipboard { paths: Vec<PathBuf>, mode: ExtractMode },
    /// Count arbitrary text, e.g. the current clipboard contents.
    CountText(String),
    SetFileTypes(FileTypeSet),
    AddFileType(String),
    RemoveFileType(String),
    SetCompressionLevel(CompressionLevel),
    GetSettings,
    SetPreference { key: String, value: Value },
}

/// A reply to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Extracted(ExtractionResult),
    Copied(ExtractionResult),
    Counts(Counts),
    Settings(Settings),
    FileTypes(FileTypeSet),
    Ok,
}

/// Per-host state: settings store, clipboard sink and the in-flight token.
pub struct Session<S, C> {
    store: S,
    clipboard: C,
    in_flight: Option<CancellationToken>,
}

impl<S: ConfigStore, C: ClipboardSink> Session<S, C> {
    pub fn new(store: S, clipboard: C) -> Self {
        Self {
            store,
            clipboard,
            in_flight: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Token for a new extraction. Any previous one is cancelled.
    ///
    /// Hosts that run [`extract`] on a worker thread call this directly
    /// and hand the token to the worker.
    pub fn begin(&mut self) -> CancellationToken {
        if let Some(previous) = self.in_flight.take() {
            debug!("cancelling previous extraction");
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        token
    }

    /// Cancel the extraction in flight, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }

    pub fn handle(&mut self, request: Request) -> Result<Response, CtxError> {
        match request {
            Request::Extract { paths, mode } => {
                Ok(Response::Extracted(self.run_extraction(&paths, mode)?))
            }
            Request::CopyToClipboard { paths, mode } => {
                let result = self.run_extraction(&paths, mode)?;
                copy_to_clipboard(&result, &self.clipboard)?;
                Ok(Response::Copied(result))
            }
            Request::CountText(text) => Ok(Response::Counts(count(&text))),
            Request::SetFileTypes(types) => {
                self.store.set_file_types(types.clone())?;
                Ok(Response::FileTypes(types))
            }
            Request::AddFileType(raw) => {
                let mut types = self.store.file_types()?;
                types.insert(&raw)?;
                self.store.set_file_types(types.clone())?;
                Ok(Response::FileTypes(types))
            }
            Request::RemoveFileType(raw) => {
                let mut types = self.store.file_types()?;
                types.remove(&raw);
                self.store.set_file_types(types.clone())?;
                Ok(Response::FileTypes(types))
            }
            Request::SetCompressionLevel(level) => {
                self.store.set_compression_level(level)?;
                Ok(Response::Ok)
            }
            Request::GetSettings => Ok(Response::Settings(self.store.load()?)),
            Request::SetPreference { key, value } => {
                self.store.set_preference(&key, value)?;
                Ok(Response::Ok)
            }
        }
    }

    fn run_extraction(
        &mut self,
        paths: &[PathBuf],
        mode: ExtractMode,
    ) -> Result<ExtractionResult, CtxError> {
        let config = self.store.load()?.extraction_config();
        let token = self.begin();
        let result = extract(paths, &config, mode, &token);
        self.in_flight = None;
        Ok(result?)
    }
}
