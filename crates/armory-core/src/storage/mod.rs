//! # Persistent Storage
//!
//! Disk-backed implementations of [`crate::CatalogStore`].

mod redb_catalog;

pub use redb_catalog::RedbCatalog;
