//! # Catalog Store
//!
//! The storage gateway of the Armory engine.
//!
//! `CatalogStore` is the only way the resolver, the propagation engine and the
//! update workflow reach data. Two implementations exist:
//! - `Catalog` (this module): in-memory, `BTreeMap` only
//! - `RedbCatalog` (`storage` module): disk-backed redb tables
//!
//! Composition edges are keyed by `(parent, component)`. Inserting the same
//! pair twice replaces the required quantity.

use crate::{
    ArmoryError, Component, Material, MaterialFields, MaterialId, PowerLevel, Weapon, WeaponId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CATALOGSTORE TRAIT
// =============================================================================

/// Read/write access to materials, weapons and their composition edges.
///
/// Reads take `&self` so a single store can be shared across resolver
/// branches; writes take `&mut self`.
pub trait CatalogStore {
    /// Fetch a material by id, deleted or not.
    fn material(&self, id: MaterialId) -> Result<Option<Material>, ArmoryError>;

    /// Fetch a weapon by id, deleted or not.
    fn weapon(&self, id: WeaponId) -> Result<Option<Weapon>, ArmoryError>;

    /// Direct components of a material, ordered by component id.
    fn material_composition(&self, parent: MaterialId) -> Result<Vec<Component>, ArmoryError>;

    /// Direct components of a weapon, ordered by component id.
    fn weapon_composition(&self, parent: WeaponId) -> Result<Vec<Component>, ArmoryError>;

    /// Materials that list `material` as a direct component.
    fn materials_composed_of(&self, material: MaterialId) -> Result<Vec<MaterialId>, ArmoryError>;

    /// Weapons that list `material` as a direct component.
    fn weapons_composed_of(&self, material: MaterialId) -> Result<Vec<WeaponId>, ArmoryError>;

    /// Overwrite the whitelisted fields of an existing material.
    fn update_material_fields(
        &mut self,
        id: MaterialId,
        fields: &MaterialFields,
    ) -> Result<(), ArmoryError>;

    /// Overwrite the cached power level of an existing weapon.
    fn update_weapon_power_level(
        &mut self,
        id: WeaponId,
        level: PowerLevel,
    ) -> Result<(), ArmoryError>;

    /// Insert a material, replacing any row with the same id.
    fn insert_material(&mut self, material: Material) -> Result<(), ArmoryError>;

    /// Insert a weapon, replacing any row with the same id.
    fn insert_weapon(&mut self, weapon: Weapon) -> Result<(), ArmoryError>;

    /// Add a material -> material composition edge.
    ///
    /// Both materials must exist and `component.qty` must be at least 1.
    fn insert_material_edge(
        &mut self,
        parent: MaterialId,
        component: Component,
    ) -> Result<(), ArmoryError>;

    /// Add a weapon -> material composition edge.
    ///
    /// Both rows must exist and `component.qty` must be at least 1.
    fn insert_weapon_edge(
        &mut self,
        parent: WeaponId,
        component: Component,
    ) -> Result<(), ArmoryError>;

    /// Set `deleted_at` on a material if it is not already set.
    ///
    /// Returns the effective deletion timestamp.
    fn soft_delete_material(
        &mut self,
        id: MaterialId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError>;

    /// Set `deleted_at` on a weapon if it is not already set.
    ///
    /// Returns the effective deletion timestamp.
    fn soft_delete_weapon(
        &mut self,
        id: WeaponId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError>;

    /// Number of material rows, including soft-deleted ones.
    fn material_count(&self) -> Result<usize, ArmoryError>;

    /// Number of weapon rows, including soft-deleted ones.
    fn weapon_count(&self) -> Result<usize, ArmoryError>;
}

/// Reject edges that the quantity resolver could not divide by.
pub(crate) fn validate_component(component: Component) -> Result<(), ArmoryError> {
    if component.qty == 0 {
        return Err(ArmoryError::Validation(format!(
            "required quantity of {} must be at least 1",
            component.material
        )));
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY CATALOG
// =============================================================================

/// In-memory catalog.
///
/// Uses `BTreeMap` exclusively so every listing is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    materials: BTreeMap<MaterialId, Material>,
    weapons: BTreeMap<WeaponId, Weapon>,

    /// parent -> (component -> required qty)
    material_edges: BTreeMap<MaterialId, BTreeMap<MaterialId, u64>>,
    weapon_edges: BTreeMap<WeaponId, BTreeMap<MaterialId, u64>>,

    /// Reverse indexes: component -> parents
    material_parents: BTreeMap<MaterialId, BTreeSet<MaterialId>>,
    weapon_parents: BTreeMap<MaterialId, BTreeSet<WeaponId>>,
}

impl Catalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CatalogStore for Catalog {
    fn material(&self, id: MaterialId) -> Result<Option<Material>, ArmoryError> {
        Ok(self.materials.get(&id).cloned())
    }

    fn weapon(&self, id: WeaponId) -> Result<Option<Weapon>, ArmoryError> {
        Ok(self.weapons.get(&id).cloned())
    }

    fn material_composition(&self, parent: MaterialId) -> Result<Vec<Component>, ArmoryError> {
        Ok(self
            .material_edges
            .get(&parent)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(m, q)| Component::new(*m, *q)))
            .collect())
    }

    fn weapon_composition(&self, parent: WeaponId) -> Result<Vec<Component>, ArmoryError> {
        Ok(self
            .weapon_edges
            .get(&parent)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(m, q)| Component::new(*m, *q)))
            .collect())
    }

    fn materials_composed_of(&self, material: MaterialId) -> Result<Vec<MaterialId>, ArmoryError> {
        Ok(self
            .material_parents
            .get(&material)
            .map(|parents| parents.iter().copied().collect())
            .unwrap_or_default())
    }

    fn weapons_composed_of(&self, material: MaterialId) -> Result<Vec<WeaponId>, ArmoryError> {
        Ok(self
            .weapon_parents
            .get(&material)
            .map(|parents| parents.iter().copied().collect())
            .unwrap_or_default())
    }

    fn update_material_fields(
        &mut self,
        id: MaterialId,
        fields: &MaterialFields,
    ) -> Result<(), ArmoryError> {
        let material = self
            .materials
            .get_mut(&id)
            .ok_or(ArmoryError::MaterialNotFound(id))?;
        material.set_fields(fields.clone());
        Ok(())
    }

    fn update_weapon_power_level(
        &mut self,
        id: WeaponId,
        level: PowerLevel,
    ) -> Result<(), ArmoryError> {
        let weapon = self
            .weapons
            .get_mut(&id)
            .ok_or(ArmoryError::WeaponNotFound(id))?;
        weapon.power_level = level;
        Ok(())
    }

    fn insert_material(&mut self, material: Material) -> Result<(), ArmoryError> {
        self.materials.insert(material.id, material);
        Ok(())
    }

    fn insert_weapon(&mut self, weapon: Weapon) -> Result<(), ArmoryError> {
        self.weapons.insert(weapon.id, weapon);
        Ok(())
    }

    fn insert_material_edge(
        &mut self,
        parent: MaterialId,
        component: Component,
    ) -> Result<(), ArmoryError> {
        validate_component(component)?;
        if !self.materials.contains_key(&parent) {
            return Err(ArmoryError::MaterialNotFound(parent));
        }
        if !self.materials.contains_key(&component.material) {
            return Err(ArmoryError::MaterialNotFound(component.material));
        }

        self.material_edges
            .entry(parent)
            .or_default()
            .insert(component.material, component.qty);
        self.material_parents
            .entry(component.material)
            .or_default()
            .insert(parent);
        Ok(())
    }

    fn insert_weapon_edge(
        &mut self,
        parent: WeaponId,
        component: Component,
    ) -> Result<(), ArmoryError> {
        validate_component(component)?;
        if !self.weapons.contains_key(&parent) {
            return Err(ArmoryError::WeaponNotFound(parent));
        }
        if !self.materials.contains_key(&component.material) {
            return Err(ArmoryError::MaterialNotFound(component.material));
        }

        self.weapon_edges
            .entry(parent)
            .or_default()
            .insert(component.material, component.qty);
        self.weapon_parents
            .entry(component.material)
            .or_default()
            .insert(parent);
        Ok(())
    }

    fn soft_delete_material(
        &mut self,
        id: MaterialId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError> {
        let material = self
            .materials
            .get_mut(&id)
            .ok_or(ArmoryError::MaterialNotFound(id))?;
        Ok(*material.deleted_at.get_or_insert(at))
    }

    fn soft_delete_weapon(
        &mut self,
        id: WeaponId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError> {
        let weapon = self
            .weapons
            .get_mut(&id)
            .ok_or(ArmoryError::WeaponNotFound(id))?;
        Ok(*weapon.deleted_at.get_or_insert(at))
    }

    fn material_count(&self) -> Result<usize, ArmoryError> {
        Ok(self.materials.len())
    }

    fn weapon_count(&self) -> Result<usize, ArmoryError> {
        Ok(self.weapons.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
