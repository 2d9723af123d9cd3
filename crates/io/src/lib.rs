//! Persistence and file exchange for gridbook documents.
//!
//! - [`kv`]: key-value backends with a byte quota
//! - [`blob`] / [`library`]: the saved-document format and the file index
//! - [`persist`] / [`autosave`]: wiring a [`gridbook_engine::store::Store`] to a library
//! - [`csv`], [`json`], [`xlsx`]: import and export

pub mod autosave;
pub mod blob;
pub mod csv;
pub mod error;
pub mod json;
pub mod kv;
pub mod library;
pub mod persist;
pub mod xlsx;

pub use error::{Result, StorageError};
