//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command opens the configured backend, runs one operation and prints
//! either a human-readable summary or, with `--json-mode`, pretty JSON.

use super::Target;
use crate::api;
use crate::config::{ArmoryConfig, Backend};
use crate::error::AppError;
use armory_core::{
    Armory, ArmoryError, CatalogDocument, Material, MaterialId, MaterialPatch, PowerLevel, Weapon,
    WeaponId,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a catalog document (50 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), ArmoryError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ArmoryError::StorageError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(ArmoryError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve symlinks and `..`, and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, ArmoryError> {
    let canonical = path.canonicalize().map_err(|e| {
        ArmoryError::Validation(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(ArmoryError::Validation(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and parse a JSON catalog document.
pub fn read_catalog_document(path: &Path) -> Result<CatalogDocument, ArmoryError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated)
        .map_err(|e| ArmoryError::StorageError(format!("Read file: {}", e)))?;
    serde_json::from_slice(&data).map_err(|e| {
        ArmoryError::SerializationError(format!("Invalid catalog document: {}", e))
    })
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server, optionally seeding it from a catalog document.
pub async fn cmd_server(config: &ArmoryConfig, import: Option<&Path>) -> Result<(), AppError> {
    let mut armory = open_armory(config)?;

    if let Some(path) = import {
        let document = read_catalog_document(path)?;
        let summary = armory.import(&document)?;
        println!(
            "Imported {} materials, {} weapons from {:?}",
            summary.materials, summary.weapons, path
        );
    }

    println!("Armory Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:    {}", config.server.addr());
    println!("  Backend:    {}", config.storage.backend);
    println!("  Database:   {:?}", config.storage.database);
    println!("  Rate limit: {} req/s", config.limits.rate_limit);
    println!();
    println!("Endpoints:");
    println!("  GET    /health                     - Health check");
    println!("  GET    /status                     - Catalog row counts");
    println!("  GET    /materials/{{id}}             - Fetch a material");
    println!("  PUT    /materials/{{id}}             - Update a material");
    println!("  DELETE /materials/{{id}}             - Soft delete a material");
    println!("  GET    /materials/{{id}}/maxQuantity - Craftable units");
    println!("  GET    /materials/{{id}}/power-level - Effective power");
    println!("  GET    /weapons/{{id}}               - Fetch a weapon");
    println!("  DELETE /weapons/{{id}}               - Soft delete a weapon");
    println!("  GET    /weapons/{{id}}/maxQuantity   - Craftable units");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(armory, config).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show catalog status.
pub fn cmd_status(config: &ArmoryConfig, json_mode: bool) -> Result<(), ArmoryError> {
    let armory = open_armory(config)?;
    let status = armory.status()?;

    if json_mode {
        let output = serde_json::json!({
            "database": config.storage.database.to_string_lossy(),
            "backend": config.storage.backend.to_string(),
            "materials": status.materials,
            "weapons": status.weapons,
            "persistent": status.persistent,
        });
        print_json(&output)?;
        return Ok(());
    }

    println!("Armory Catalog Status");
    println!("=====================");
    println!("Database:  {:?}", config.storage.database);
    println!("Backend:   {}", config.storage.backend);
    println!();
    println!("Materials: {}", status.materials);
    println!("Weapons:   {}", status.weapons);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(config: &ArmoryConfig, force: bool) -> Result<(), ArmoryError> {
    let db_path = &config.storage.database;

    match config.storage.backend {
        Backend::Memory => {
            println!("Memory backend selected: nothing to initialize");
        }
        Backend::Redb => {
            if db_path.exists() {
                if !force {
                    return Err(ArmoryError::Validation(
                        "Database already exists. Use --force to overwrite.".to_string(),
                    ));
                }
                std::fs::remove_file(db_path).map_err(|e| {
                    ArmoryError::StorageError(format!("Remove existing database: {}", e))
                })?;
            }
            let _armory = Armory::with_redb(db_path)?;
            println!("Initialized new redb database at {:?}", db_path);
        }
    }

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Load a JSON catalog document into the configured backend.
pub fn cmd_import(config: &ArmoryConfig, json_mode: bool, file: &Path) -> Result<(), ArmoryError> {
    let document = read_catalog_document(file)?;
    let mut armory = open_armory(config)?;
    let summary = armory.import(&document)?;

    if json_mode {
        print_json(&summary)?;
        return Ok(());
    }

    println!("Imported catalog from {:?}", file);
    println!("  Materials:             {}", summary.materials);
    println!("  Weapons:               {}", summary.weapons);
    println!("  Material compositions: {}", summary.material_compositions);
    println!("  Weapon compositions:   {}", summary.weapon_compositions);
    println!("  Recomputed weapons:    {}", summary.recomputed_weapons);
    if !armory.is_persistent() {
        println!("Note: memory backend, the import is discarded on exit");
    }

    Ok(())
}

// =============================================================================
// ROW COMMANDS
// =============================================================================

/// Show one material.
pub fn cmd_material(config: &ArmoryConfig, json_mode: bool, id: u64) -> Result<(), ArmoryError> {
    let armory = open_armory(config)?;
    let material = armory.material(MaterialId(id))?;

    if json_mode {
        print_json(&material)?;
    } else {
        print_material(&material);
    }
    Ok(())
}

/// Show one weapon, computing its power level if it is unknown.
pub fn cmd_weapon(config: &ArmoryConfig, json_mode: bool, id: u64) -> Result<(), ArmoryError> {
    let mut armory = open_armory(config)?;
    let weapon = armory.weapon(WeaponId(id))?;

    if json_mode {
        print_json(&weapon)?;
    } else {
        print_weapon(&weapon);
    }
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Units of a material or weapon available from stock plus manufacturing.
pub fn cmd_max_quantity(
    config: &ArmoryConfig,
    json_mode: bool,
    target: Target,
) -> Result<(), ArmoryError> {
    let armory = open_armory(config)?;

    let (kind, id, quantity) = match (target.material, target.weapon) {
        (Some(id), _) => ("material", id, armory.material_max_quantity(MaterialId(id))?),
        (None, Some(id)) => ("weapon", id, armory.weapon_max_quantity(WeaponId(id))?),
        (None, None) => {
            return Err(ArmoryError::Validation(
                "Specify --material or --weapon".to_string(),
            ));
        }
    };

    if json_mode {
        print_json(&serde_json::json!({ "kind": kind, "id": id, "max_quantity": quantity }))?;
    } else {
        println!("Max quantity of {} {}: {}", kind, id, quantity);
    }
    Ok(())
}

/// Effective power of a material.
pub fn cmd_power_level(config: &ArmoryConfig, json_mode: bool, id: u64) -> Result<(), ArmoryError> {
    let armory = open_armory(config)?;
    let power = armory.material_power_level(MaterialId(id))?;

    if json_mode {
        print_json(&serde_json::json!({ "material": id, "power_level": power }))?;
    } else {
        println!("Power level of material {}: {}", id, power);
    }
    Ok(())
}

// =============================================================================
// WRITE COMMANDS
// =============================================================================

/// Partial update of a material, propagating base power changes to weapons.
pub fn cmd_update_material(
    config: &ArmoryConfig,
    json_mode: bool,
    id: u64,
    patch: &MaterialPatch,
) -> Result<(), ArmoryError> {
    let mut armory = open_armory(config)?;
    let outcome = armory.update_material(MaterialId(id), patch)?;

    if json_mode {
        print_json(&serde_json::json!({
            "material": outcome.material,
            "propagation": outcome.propagation,
        }))?;
        return Ok(());
    }

    println!("Updated material {}", id);
    print_material(&outcome.material);
    match outcome.propagation {
        Some(report) => {
            println!();
            println!("Propagation:");
            println!("  Weapons examined: {}", report.examined);
            println!("  Weapons updated:  {:?}", ids(&report.updated));
            if !report.degraded.is_empty() {
                println!("  Now unknown:      {:?}", ids(&report.degraded));
            }
        }
        None => println!("Base power unchanged, no propagation"),
    }
    Ok(())
}

/// Soft delete a material or weapon.
pub fn cmd_delete(config: &ArmoryConfig, json_mode: bool, target: Target) -> Result<(), ArmoryError> {
    let mut armory = open_armory(config)?;

    match (target.material, target.weapon) {
        (Some(id), _) => {
            let material = armory.delete_material(MaterialId(id))?;
            if json_mode {
                print_json(&material)?;
            } else {
                println!("Deleted material {}", id);
                print_material(&material);
            }
        }
        (None, Some(id)) => {
            let weapon = armory.delete_weapon(WeaponId(id))?;
            if json_mode {
                print_json(&weapon)?;
            } else {
                println!("Deleted weapon {}", id);
                print_weapon(&weapon);
            }
        }
        (None, None) => {
            return Err(ArmoryError::Validation(
                "Specify --material or --weapon".to_string(),
            ));
        }
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured backend.
pub fn open_armory(config: &ArmoryConfig) -> Result<Armory, ArmoryError> {
    match config.storage.backend {
        Backend::Redb => Armory::with_redb(&config.storage.database),
        Backend::Memory => {
            tracing::warn!("Using the memory backend: changes are lost on exit");
            Ok(Armory::new())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ArmoryError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ArmoryError::SerializationError(format!("JSON output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn print_material(material: &Material) {
    println!("Material {}", material.id.0);
    println!("  Name:       {}", material.name);
    match material.base_power {
        Some(power) => println!("  Base power: {}", power),
        None => println!("  Base power: (none)"),
    }
    println!("  Stock:      {}", material.qty);
    if let Some(deleted_at) = material.deleted_at {
        println!("  Deleted at: {}", deleted_at.to_rfc3339());
    }
}

fn print_weapon(weapon: &Weapon) {
    println!("Weapon {}", weapon.id.0);
    println!("  Name:        {}", weapon.name);
    match weapon.power_level {
        PowerLevel::Known(power) => println!("  Power level: {}", power),
        PowerLevel::Unknown => println!("  Power level: unknown"),
    }
    println!("  Stock:       {}", weapon.qty);
    if let Some(deleted_at) = weapon.deleted_at {
        println!("  Deleted at:  {}", deleted_at.to_rfc3339());
    }
}

fn ids(weapons: &[WeaponId]) -> Vec<u64> {
    weapons.iter().map(|w| w.0).collect()
}
