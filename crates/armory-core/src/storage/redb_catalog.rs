//! # redb-backed Catalog Storage
//!
//! A disk-backed catalog using the redb embedded database.
//!
//! Rows are postcard-encoded. Composition edges live in tuple-keyed tables so
//! that all components of one parent form a contiguous key range:
//! - forward: `(parent, component) -> qty`
//! - reverse: `(component, parent) -> qty`
//!
//! Every write runs in its own redb transaction. Reads open a fresh read
//! transaction, so the resolver may query from several rayon workers at once.

use crate::catalog::{CatalogStore, validate_component};
use crate::{
    ArmoryError, Component, Material, MaterialFields, MaterialId, PowerLevel, Weapon, WeaponId,
};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

type RowTable = TableDefinition<'static, u64, &'static [u8]>;
type EdgeTable = TableDefinition<'static, (u64, u64), u64>;

/// MaterialId(u64) -> serialized Material
const MATERIALS: RowTable = TableDefinition::new("materials");

/// WeaponId(u64) -> serialized Weapon
const WEAPONS: RowTable = TableDefinition::new("weapons");

/// (parent material, component material) -> required qty
const MATERIAL_EDGES: EdgeTable = TableDefinition::new("material_compositions");

/// (component material, parent material) -> required qty
const MATERIAL_PARENTS: EdgeTable = TableDefinition::new("material_parents");

/// (weapon, component material) -> required qty
const WEAPON_EDGES: EdgeTable = TableDefinition::new("weapon_compositions");

/// (component material, weapon) -> required qty
const WEAPON_PARENTS: EdgeTable = TableDefinition::new("weapon_parents");

fn storage_err(e: impl std::fmt::Display) -> ArmoryError {
    ArmoryError::StorageError(e.to_string())
}

fn codec_err(e: impl std::fmt::Display) -> ArmoryError {
    ArmoryError::SerializationError(e.to_string())
}

/// A disk-backed catalog store.
pub struct RedbCatalog {
    db: Database,
}

impl std::fmt::Debug for RedbCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCatalog").finish_non_exhaustive()
    }
}

impl RedbCatalog {
    /// Open or create a catalog database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArmoryError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Create every table up front so read transactions never miss one.
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(MATERIALS).map_err(storage_err)?;
            let _ = write_txn.open_table(WEAPONS).map_err(storage_err)?;
            for table in [MATERIAL_EDGES, MATERIAL_PARENTS, WEAPON_EDGES, WEAPON_PARENTS] {
                let _ = write_txn.open_table(table).map_err(storage_err)?;
            }
            write_txn.commit().map_err(storage_err)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "opened redb catalog");
        Ok(Self { db })
    }

    fn get_row<T: DeserializeOwned>(&self, def: RowTable, id: u64) -> Result<Option<T>, ArmoryError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(def).map_err(storage_err)?;
        let Some(data) = table.get(id).map_err(storage_err)? else {
            return Ok(None);
        };
        let row = postcard::from_bytes(data.value()).map_err(codec_err)?;
        Ok(Some(row))
    }

    fn put_row<T: Serialize>(&mut self, def: RowTable, id: u64, row: &T) -> Result<(), ArmoryError> {
        let bytes = postcard::to_allocvec(row).map_err(codec_err)?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(def).map_err(storage_err)?;
            table.insert(id, bytes.as_slice()).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    /// Read-modify-write a single row inside one transaction.
    fn edit_row<T, R>(
        &mut self,
        def: RowTable,
        id: u64,
        missing: ArmoryError,
        edit: impl FnOnce(&mut T) -> R,
    ) -> Result<R, ArmoryError>
    where
        T: Serialize + DeserializeOwned,
    {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let result = {
            let mut table = write_txn.open_table(def).map_err(storage_err)?;
            let existing = table
                .get(id)
                .map_err(storage_err)?
                .map(|data| data.value().to_vec());
            let Some(existing) = existing else {
                return Err(missing);
            };

            let mut row: T = postcard::from_bytes(&existing).map_err(codec_err)?;
            let result = edit(&mut row);
            let bytes = postcard::to_allocvec(&row).map_err(codec_err)?;
            table.insert(id, bytes.as_slice()).map_err(storage_err)?;
            result
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(result)
    }

    /// All `(second key, qty)` pairs under `first` in a tuple-keyed table.
    fn edge_range(&self, def: EdgeTable, first: u64) -> Result<Vec<(u64, u64)>, ArmoryError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(def).map_err(storage_err)?;

        let mut entries = Vec::new();
        for entry in table
            .range((first, 0u64)..=(first, u64::MAX))
            .map_err(storage_err)?
        {
            let (key, qty) = entry.map_err(storage_err)?;
            entries.push((key.value().1, qty.value()));
        }
        Ok(entries)
    }

    /// Insert a forward edge and its reverse index entry in one transaction.
    fn put_edge(
        &mut self,
        parents: (RowTable, u64, ArmoryError),
        forward: EdgeTable,
        reverse: EdgeTable,
        component: Component,
    ) -> Result<(), ArmoryError> {
        validate_component(component)?;
        let (parent_table, parent, parent_missing) = parents;
        let child = component.material.0;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let parent_rows = write_txn.open_table(parent_table).map_err(storage_err)?;
            if parent_rows.get(parent).map_err(storage_err)?.is_none() {
                return Err(parent_missing);
            }
        }
        {
            let materials = write_txn.open_table(MATERIALS).map_err(storage_err)?;
            if materials.get(child).map_err(storage_err)?.is_none() {
                return Err(ArmoryError::MaterialNotFound(component.material));
            }
        }
        {
            let mut forward_table = write_txn.open_table(forward).map_err(storage_err)?;
            forward_table
                .insert((parent, child), component.qty)
                .map_err(storage_err)?;
            let mut reverse_table = write_txn.open_table(reverse).map_err(storage_err)?;
            reverse_table
                .insert((child, parent), component.qty)
                .map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn row_count(&self, def: RowTable) -> Result<usize, ArmoryError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(def).map_err(storage_err)?;
        let len = table.len().map_err(storage_err)?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }
}

// =============================================================================
// CATALOGSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl CatalogStore for RedbCatalog {
    fn material(&self, id: MaterialId) -> Result<Option<Material>, ArmoryError> {
        self.get_row(MATERIALS, id.0)
    }

    fn weapon(&self, id: WeaponId) -> Result<Option<Weapon>, ArmoryError> {
        self.get_row(WEAPONS, id.0)
    }

    fn material_composition(&self, parent: MaterialId) -> Result<Vec<Component>, ArmoryError> {
        Ok(self
            .edge_range(MATERIAL_EDGES, parent.0)?
            .into_iter()
            .map(|(child, qty)| Component::new(MaterialId(child), qty))
            .collect())
    }

    fn weapon_composition(&self, parent: WeaponId) -> Result<Vec<Component>, ArmoryError> {
        Ok(self
            .edge_range(WEAPON_EDGES, parent.0)?
            .into_iter()
            .map(|(child, qty)| Component::new(MaterialId(child), qty))
            .collect())
    }

    fn materials_composed_of(&self, material: MaterialId) -> Result<Vec<MaterialId>, ArmoryError> {
        Ok(self
            .edge_range(MATERIAL_PARENTS, material.0)?
            .into_iter()
            .map(|(parent, _)| MaterialId(parent))
            .collect())
    }

    fn weapons_composed_of(&self, material: MaterialId) -> Result<Vec<WeaponId>, ArmoryError> {
        Ok(self
            .edge_range(WEAPON_PARENTS, material.0)?
            .into_iter()
            .map(|(parent, _)| WeaponId(parent))
            .collect())
    }

    fn update_material_fields(
        &mut self,
        id: MaterialId,
        fields: &MaterialFields,
    ) -> Result<(), ArmoryError> {
        self.edit_row(
            MATERIALS,
            id.0,
            ArmoryError::MaterialNotFound(id),
            |material: &mut Material| material.set_fields(fields.clone()),
        )
    }

    fn update_weapon_power_level(
        &mut self,
        id: WeaponId,
        level: PowerLevel,
    ) -> Result<(), ArmoryError> {
        self.edit_row(
            WEAPONS,
            id.0,
            ArmoryError::WeaponNotFound(id),
            |weapon: &mut Weapon| weapon.power_level = level,
        )
    }

    fn insert_material(&mut self, material: Material) -> Result<(), ArmoryError> {
        self.put_row(MATERIALS, material.id.0, &material)
    }

    fn insert_weapon(&mut self, weapon: Weapon) -> Result<(), ArmoryError> {
        self.put_row(WEAPONS, weapon.id.0, &weapon)
    }

    fn insert_material_edge(
        &mut self,
        parent: MaterialId,
        component: Component,
    ) -> Result<(), ArmoryError> {
        self.put_edge(
            (MATERIALS, parent.0, ArmoryError::MaterialNotFound(parent)),
            MATERIAL_EDGES,
            MATERIAL_PARENTS,
            component,
        )
    }

    fn insert_weapon_edge(
        &mut self,
        parent: WeaponId,
        component: Component,
    ) -> Result<(), ArmoryError> {
        self.put_edge(
            (WEAPONS, parent.0, ArmoryError::WeaponNotFound(parent)),
            WEAPON_EDGES,
            WEAPON_PARENTS,
            component,
        )
    }

    fn soft_delete_material(
        &mut self,
        id: MaterialId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError> {
        self.edit_row(
            MATERIALS,
            id.0,
            ArmoryError::MaterialNotFound(id),
            |material: &mut Material| *material.deleted_at.get_or_insert(at),
        )
    }

    fn soft_delete_weapon(
        &mut self,
        id: WeaponId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError> {
        self.edit_row(
            WEAPONS,
            id.0,
            ArmoryError::WeaponNotFound(id),
            |weapon: &mut Weapon| *weapon.deleted_at.get_or_insert(at),
        )
    }

    fn material_count(&self) -> Result<usize, ArmoryError> {
        self.row_count(MATERIALS)
    }

    fn weapon_count(&self) -> Result<usize, ArmoryError> {
        self.row_count(WEAPONS)
    }
}
