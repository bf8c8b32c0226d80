//! Document storage for livemark
//!
//! All document paths are derived from `(dimension, kind)` through the
//! `DocumentStore` trait. The primary implementation is `FileStore`.

mod file;
mod retry;
mod traits;

pub use file::{read_if_exists, write_atomic, FileStore};
pub use retry::RetryPolicy;
pub use traits::{
    encode, Document, DocumentStore, DocumentStoreExt, Loaded, ReadState, StorageError,
    StorageResult,
};
