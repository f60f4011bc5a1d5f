//! # Application Errors
//!
//! Failures the binary can report: engine errors from `armory-core` plus the
//! ones that only exist at this layer (configuration, socket setup).

use crate::config::ConfigError;
use armory_core::ArmoryError;
use thiserror::Error;

/// Top-level error returned by CLI commands and the server loop.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] ArmoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
