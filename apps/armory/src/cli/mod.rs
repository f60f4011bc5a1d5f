//! # Armory CLI Module
//!
//! This module implements the CLI interface for Armory.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show catalog row counts
//! - `init` - Initialize a new database
//! - `import` - Load a JSON catalog document
//! - `material` / `weapon` - Show one row
//! - `max-quantity` - Units obtainable from stock plus manufacturing
//! - `power-level` - Effective power of a material
//! - `update-material` - Partial update of a material
//! - `delete` - Soft delete a material or weapon

mod commands;

use crate::config::{ArmoryConfig, Backend};
use crate::error::AppError;
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Armory - weapons, materials and their bill of materials
///
/// Resolves power levels and craftable quantities over the composition graph
/// and keeps cached weapon power levels up to date.
#[derive(Parser, Debug)]
#[command(name = "armory")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the catalog database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Path to a TOML config file (default: $ARMORY_CONFIG, then ./armory.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Selects exactly one material or weapon.
#[derive(Args, Debug, Clone, Copy)]
#[command(group(ArgGroup::new("target").required(true).args(["material", "weapon"])))]
pub struct Target {
    /// Material id
    #[arg(long)]
    pub material: Option<u64>,

    /// Weapon id
    #[arg(long)]
    pub weapon: Option<u64>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Catalog document to load before serving
        #[arg(short, long)]
        import: Option<PathBuf>,
    },

    /// Show catalog status
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Import a JSON catalog document
    Import {
        /// Path to the catalog document
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show a material
    Material {
        /// Material id
        id: u64,
    },

    /// Show a weapon, computing its power level if unknown
    Weapon {
        /// Weapon id
        id: u64,
    },

    /// Units obtainable from stock plus manufacturing
    MaxQuantity {
        #[command(flatten)]
        target: Target,
    },

    /// Effective power of a material including its components
    PowerLevel {
        /// Material id
        id: u64,
    },

    /// Update a material's name, base power or stock
    UpdateMaterial {
        /// Material id
        id: u64,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New base power
        #[arg(long, allow_negative_numbers = true, conflicts_with = "clear_base_power")]
        base_power: Option<i64>,

        /// Clear the base power
        #[arg(long)]
        clear_base_power: bool,

        /// New stock quantity
        #[arg(long, allow_negative_numbers = true)]
        qty: Option<i64>,
    },

    /// Soft delete a material or weapon
    Delete {
        #[command(flatten)]
        target: Target,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve configuration: config file and environment, then CLI flags.
pub fn resolve_config(cli: &Cli) -> Result<ArmoryConfig, AppError> {
    let mut config = ArmoryConfig::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.storage.database = database.clone();
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if let Some(Commands::Server { host, port, .. }) = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { import, .. }) => cmd_server(&config, import.as_deref()).await?,
        Some(Commands::Status) | None => cmd_status(&config, json_mode)?,
        Some(Commands::Init { force }) => cmd_init(&config, force)?,
        Some(Commands::Import { file }) => cmd_import(&config, json_mode, &file)?,
        Some(Commands::Material { id }) => cmd_material(&config, json_mode, id)?,
        Some(Commands::Weapon { id }) => cmd_weapon(&config, json_mode, id)?,
        Some(Commands::MaxQuantity { target }) => cmd_max_quantity(&config, json_mode, target)?,
        Some(Commands::PowerLevel { id }) => cmd_power_level(&config, json_mode, id)?,
        Some(Commands::UpdateMaterial {
            id,
            name,
            base_power,
            clear_base_power,
            qty,
        }) => {
            let base_power = if clear_base_power {
                Some(None)
            } else {
                base_power.map(Some)
            };
            let patch = armory_core::MaterialPatch {
                name,
                base_power,
                qty,
            };
            cmd_update_material(&config, json_mode, id, &patch)?;
        }
        Some(Commands::Delete { target }) => cmd_delete(&config, json_mode, target)?,
    }
    Ok(())
}
