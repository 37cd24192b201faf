//! Persistent Store
//!
//! Write-back JSON documents with debounced autosave.

pub mod document;
pub mod files;

pub use document::{DocumentValue, JsonDocument, StoreError, DEFAULT_AUTOSAVE_INTERVAL};
pub use files::{CustomCommands, DataFiles, Properties};
