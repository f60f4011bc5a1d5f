//! # Armory
//!
//! HTTP API, CLI and configuration for the Armory inventory server.
//! Resolution and persistence live in `armory-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
