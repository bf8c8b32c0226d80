//! Storage trait definitions

use crate::model::{Dimension, DocumentKind, MarkerDocument, PlayerDocument, SettingsDocument};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Gave up on {} after {attempts} attempts: {source}", path.display())]
    RetriesExhausted {
        path: PathBuf,
        attempts: u32,
        source: std::io::Error,
    },

    #[error("Invalid dimension name: {0:?}")]
    InvalidDimension(String),

    #[error("Marker id space exhausted")]
    IdsExhausted,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A JSON document addressed by `(dimension, kind)`
///
/// `Default` is the empty document returned for missing or malformed files.
pub trait Document: Serialize + DeserializeOwned + Default {
    const KIND: DocumentKind;
}

impl Document for MarkerDocument {
    const KIND: DocumentKind = DocumentKind::Markers;
}

impl Document for PlayerDocument {
    const KIND: DocumentKind = DocumentKind::Players;
}

impl Document for SettingsDocument {
    const KIND: DocumentKind = DocumentKind::Settings;
}

/// How a document read resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// File existed and parsed
    Present,
    /// No file; the empty default was substituted
    Missing,
    /// File existed but did not parse; the empty default was substituted
    Malformed,
}

/// A decoded document together with the bytes it was decoded from
#[derive(Debug, Clone)]
pub struct Loaded<D> {
    pub document: D,
    pub state: ReadState,
    /// File contents as read, `None` when the file was missing
    pub raw: Option<Vec<u8>>,
}

impl<D: Document> Loaded<D> {
    /// Whether `document` would serialize to exactly the text on disk
    pub fn unchanged(&self, document: &D) -> StorageResult<bool> {
        match &self.raw {
            Some(raw) => Ok(raw.as_slice() == encode(document)?.as_bytes()),
            None => Ok(false),
        }
    }
}

/// Serialize a document the way it is written to disk
pub fn encode<D: Serialize>(document: &D) -> StorageResult<String> {
    let mut text = serde_json::to_string_pretty(document)?;
    text.push('\n');
    Ok(text)
}

/// Trait for document storage backends
///
/// Implementations must be thread-safe (Send + Sync): the sync engine writes
/// while any number of readers load documents concurrently. `write_raw` must
/// never expose a partially written document to a reader.
pub trait DocumentStore: Send + Sync {
    /// Read a document's bytes, `None` if it does not exist
    fn read_raw(&self, dimension: &Dimension, kind: DocumentKind) -> StorageResult<Option<Vec<u8>>>;

    /// Replace a document's text, creating parent directories as needed
    fn write_raw(&self, dimension: &Dimension, kind: DocumentKind, contents: &str) -> StorageResult<()>;

    /// Location of a document, for diagnostics and change filtering
    fn document_path(&self, dimension: &Dimension, kind: DocumentKind) -> PathBuf;
}

/// Typed reads and writes on top of any [`DocumentStore`]
pub trait DocumentStoreExt: DocumentStore {
    /// Load a document, substituting the empty default when it is missing or
    /// malformed. Only I/O failures are returned as errors.
    fn load<D: Document>(&self, dimension: &Dimension) -> StorageResult<Loaded<D>> {
        let Some(raw) = self.read_raw(dimension, D::KIND)? else {
            return Ok(Loaded {
                document: D::default(),
                state: ReadState::Missing,
                raw: None,
            });
        };
        // from_slice rejects invalid UTF-8 along with invalid JSON
        match serde_json::from_slice(&raw) {
            Ok(document) => Ok(Loaded {
                document,
                state: ReadState::Present,
                raw: Some(raw),
            }),
            Err(e) => {
                warn!(
                    dimension = %dimension,
                    kind = %D::KIND,
                    error = %e,
                    "malformed document, treating as empty"
                );
                Ok(Loaded {
                    document: D::default(),
                    state: ReadState::Malformed,
                    raw: Some(raw),
                })
            }
        }
    }

    /// Read a document (empty default when missing or malformed)
    fn read<D: Document>(&self, dimension: &Dimension) -> StorageResult<D> {
        Ok(self.load(dimension)?.document)
    }

    /// Write a document atomically
    fn write<D: Document>(&self, dimension: &Dimension, document: &D) -> StorageResult<()> {
        let text = encode(document)?;
        self.write_raw(dimension, D::KIND, &text)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
