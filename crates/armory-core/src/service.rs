//! # Armory Service
//!
//! The entry point used by the HTTP and CLI layers.
//!
//! `Armory` owns a storage backend and exposes the catalog operations:
//! reads, quantity and power queries, updates with propagation, soft delete
//! and import. Every operation delegates to the engine modules; this type only
//! picks the backend and turns missing rows into not-found errors.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `Catalog` (fast, volatile)
//! - `Persistent`: `RedbCatalog` (disk-backed, ACID)

use crate::catalog::{Catalog, CatalogStore};
use crate::formats::{CatalogDocument, ImportSummary};
use crate::propagation::PropagationEngine;
use crate::resolver::Resolver;
use crate::storage::RedbCatalog;
use crate::workflow::{UpdateOutcome, UpdateWorkflow};
use crate::{ArmoryError, Material, MaterialId, MaterialPatch, NodeRef, Weapon, WeaponId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run `$body` with `$store` bound to whichever backend is active.
macro_rules! with_store {
    ($backend:expr, $store:ident => $body:expr) => {
        match $backend {
            StorageBackend::InMemory($store) => $body,
            StorageBackend::Persistent($store) => $body,
        }
    };
}

/// Storage backend for an `Armory`.
#[derive(Debug)]
enum StorageBackend {
    /// In-memory catalog (fast, volatile).
    InMemory(Catalog),
    /// Disk-backed catalog using redb.
    Persistent(RedbCatalog),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Catalog::new())
    }
}

/// Row counts reported by `GET /status` and `armory status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStatus {
    pub materials: usize,
    pub weapons: usize,
    pub persistent: bool,
}

/// Catalog operations over a single storage backend.
#[derive(Debug, Default)]
pub struct Armory {
    backend: StorageBackend,
}

impl Armory {
    /// Create an empty armory with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an armory over an existing in-memory catalog.
    #[must_use]
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            backend: StorageBackend::InMemory(catalog),
        }
    }

    /// Open or create a persistent armory at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, ArmoryError> {
        Ok(Self::with_redb_catalog(RedbCatalog::open(path)?))
    }

    /// Create an armory over an already opened redb catalog.
    #[must_use]
    pub fn with_redb_catalog(catalog: RedbCatalog) -> Self {
        Self {
            backend: StorageBackend::Persistent(catalog),
        }
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fetch a material, deleted or not.
    pub fn material(&self, id: MaterialId) -> Result<Material, ArmoryError> {
        with_store!(&self.backend, store => store.material(id))?
            .ok_or(ArmoryError::MaterialNotFound(id))
    }

    /// Fetch a weapon exactly as stored, without recomputing its power level.
    pub fn peek_weapon(&self, id: WeaponId) -> Result<Weapon, ArmoryError> {
        with_store!(&self.backend, store => store.weapon(id))?
            .ok_or(ArmoryError::WeaponNotFound(id))
    }

    /// Fetch a weapon, computing and persisting its power level if unknown.
    pub fn weapon(&mut self, id: WeaponId) -> Result<Weapon, ArmoryError> {
        let weapon = self.peek_weapon(id)?;
        if weapon.power_level.is_known() {
            return Ok(weapon);
        }

        let power_level = with_store!(&mut self.backend, store => {
            PropagationEngine::force_recompute(store, &weapon)
        })?;
        Ok(Weapon {
            power_level,
            ..weapon
        })
    }

    /// Catalog row counts.
    pub fn status(&self) -> Result<CatalogStatus, ArmoryError> {
        let (materials, weapons) = with_store!(&self.backend, store => {
            (store.material_count()?, store.weapon_count()?)
        });
        Ok(CatalogStatus {
            materials,
            weapons,
            persistent: self.is_persistent(),
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Units of a material available from stock plus manufacturing.
    pub fn material_max_quantity(&self, id: MaterialId) -> Result<u64, ArmoryError> {
        self.max_quantity(NodeRef::Material(id))
    }

    /// Units of a weapon available from stock plus manufacturing.
    pub fn weapon_max_quantity(&self, id: WeaponId) -> Result<u64, ArmoryError> {
        self.max_quantity(NodeRef::Weapon(id))
    }

    /// Effective power of a material including everything it is made of.
    pub fn material_power_level(&self, id: MaterialId) -> Result<i64, ArmoryError> {
        with_store!(&self.backend, store => {
            Resolver::new(store).power_level(NodeRef::Material(id))
        })
    }

    fn max_quantity(&self, root: NodeRef) -> Result<u64, ArmoryError> {
        with_store!(&self.backend, store => Resolver::new(store).possible_quantity(root))
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Apply a partial update to a material, propagating base power changes.
    pub fn update_material(
        &mut self,
        id: MaterialId,
        patch: &MaterialPatch,
    ) -> Result<UpdateOutcome, ArmoryError> {
        with_store!(&mut self.backend, store => UpdateWorkflow::update_material(store, id, patch))
    }

    /// Soft delete a material. Deleting twice keeps the first timestamp.
    pub fn delete_material(&mut self, id: MaterialId) -> Result<Material, ArmoryError> {
        let deleted_at = with_store!(&mut self.backend, store => {
            store.soft_delete_material(id, Utc::now())
        })?;
        tracing::info!(material = id.0, %deleted_at, "material deleted");
        self.material(id)
    }

    /// Soft delete a weapon. Deleting twice keeps the first timestamp.
    pub fn delete_weapon(&mut self, id: WeaponId) -> Result<Weapon, ArmoryError> {
        let deleted_at = with_store!(&mut self.backend, store => {
            store.soft_delete_weapon(id, Utc::now())
        })?;
        tracing::info!(weapon = id.0, %deleted_at, "weapon deleted");
        self.peek_weapon(id)
    }

    /// Load a catalog document into the active backend.
    pub fn import(&mut self, document: &CatalogDocument) -> Result<ImportSummary, ArmoryError> {
        with_store!(&mut self.backend, store => document.apply_to(store))
    }
}

// =============================================================================
// TESTS
// =============================================================================
