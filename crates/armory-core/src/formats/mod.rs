//! # Formats
//!
//! Interchange formats for catalog data. File I/O lives in the app layer.

mod catalog_document;

pub use catalog_document::{CatalogDocument, CompositionRow, ImportSummary};
