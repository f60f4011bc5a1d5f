//! # Catalog Document
//!
//! A serde document describing a whole catalog: rows plus composition edges.
//! The app layer reads it from JSON; this module only validates and applies it.
//!
//! Validation runs over the whole document before the first write, so a
//! malformed document leaves the store untouched.
//!
//! Cached power levels are never taken from the document. Imported weapon
//! rows start as unknown, and weapons already in the store that the import
//! touches (a changed base power, a new edge under an existing row) are
//! recomputed through the propagation engine once every edge is written.

use crate::catalog::CatalogStore;
use crate::primitives::{MAX_IMPORT_ROWS, MAX_NAME_LENGTH};
use crate::propagation::PropagationEngine;
use crate::{ArmoryError, Component, Material, MaterialId, PowerLevel, Weapon, WeaponId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One composition edge as it appears in a catalog document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRow {
    pub parent_id: u64,
    pub material_id: u64,
    pub qty: u64,
}

impl CompositionRow {
    fn component(&self) -> Component {
        Component::new(MaterialId(self.material_id), self.qty)
    }
}

/// A complete catalog in interchange form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    #[serde(default)]
    pub material_compositions: Vec<CompositionRow>,
    #[serde(default)]
    pub weapon_compositions: Vec<CompositionRow>,
}

/// Row counts written by [`CatalogDocument::apply_to`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub materials: usize,
    pub weapons: usize,
    pub material_compositions: usize,
    pub weapon_compositions: usize,
    /// Existing weapons whose cached power level was rewritten.
    #[serde(default)]
    pub recomputed_weapons: usize,
}

impl CatalogDocument {
    /// Validate the document against itself and the rows already in `store`.
    pub fn validate<S: CatalogStore + ?Sized>(&self, store: &S) -> Result<(), ArmoryError> {
        let sections = [
            ("materials", self.materials.len()),
            ("weapons", self.weapons.len()),
            ("material_compositions", self.material_compositions.len()),
            ("weapon_compositions", self.weapon_compositions.len()),
        ];
        for (section, len) in sections {
            if len > MAX_IMPORT_ROWS {
                return Err(ArmoryError::Validation(format!(
                    "{section} has {len} rows, limit is {MAX_IMPORT_ROWS}"
                )));
            }
        }

        let names = self
            .materials
            .iter()
            .map(|m| m.name.as_str())
            .chain(self.weapons.iter().map(|w| w.name.as_str()));
        for name in names {
            if name.trim().is_empty() || name.len() > MAX_NAME_LENGTH {
                return Err(ArmoryError::Validation(format!(
                    "name {name:?} must be 1..={MAX_NAME_LENGTH} bytes"
                )));
            }
        }

        let materials: BTreeSet<MaterialId> = self.materials.iter().map(|m| m.id).collect();
        let weapons: BTreeSet<WeaponId> = self.weapons.iter().map(|w| w.id).collect();

        let material_exists = |id: MaterialId| -> Result<bool, ArmoryError> {
            Ok(materials.contains(&id) || store.material(id)?.is_some())
        };

        for row in &self.material_compositions {
            Self::check_qty(row)?;
            let parent = MaterialId(row.parent_id);
            if !material_exists(parent)? {
                return Err(ArmoryError::MaterialNotFound(parent));
            }
            if !material_exists(MaterialId(row.material_id))? {
                return Err(ArmoryError::MaterialNotFound(MaterialId(row.material_id)));
            }
        }

        for row in &self.weapon_compositions {
            Self::check_qty(row)?;
            let parent = WeaponId(row.parent_id);
            if !weapons.contains(&parent) && store.weapon(parent)?.is_none() {
                return Err(ArmoryError::WeaponNotFound(parent));
            }
            if !material_exists(MaterialId(row.material_id))? {
                return Err(ArmoryError::MaterialNotFound(MaterialId(row.material_id)));
            }
        }

        Ok(())
    }

    /// Validate, then write rows first and edges second, then bring cached
    /// power levels of the affected existing weapons up to date.
    pub fn apply_to<S: CatalogStore + Sync + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<ImportSummary, ArmoryError> {
        self.validate(&*store)?;
        let (stale_materials, rewired_weapons) = self.affected_rows(&*store)?;

        for material in &self.materials {
            store.insert_material(material.clone())?;
        }
        for weapon in &self.weapons {
            store.insert_weapon(Weapon {
                power_level: PowerLevel::Unknown,
                ..weapon.clone()
            })?;
        }
        for row in &self.material_compositions {
            store.insert_material_edge(MaterialId(row.parent_id), row.component())?;
        }
        for row in &self.weapon_compositions {
            store.insert_weapon_edge(WeaponId(row.parent_id), row.component())?;
        }

        let mut recomputed = BTreeSet::new();
        for material in stale_materials {
            let report = PropagationEngine::propagate(store, material)?;
            recomputed.extend(report.updated);
        }
        for id in rewired_weapons {
            let Some(weapon) = store.weapon(id)? else {
                continue;
            };
            let level = PropagationEngine::force_recompute(store, &weapon)?;
            if level != weapon.power_level {
                recomputed.insert(id);
            }
        }

        let summary = ImportSummary {
            materials: self.materials.len(),
            weapons: self.weapons.len(),
            material_compositions: self.material_compositions.len(),
            weapon_compositions: self.weapon_compositions.len(),
            recomputed_weapons: recomputed.len(),
        };
        tracing::info!(?summary, "catalog imported");
        Ok(summary)
    }

    /// Rows already in `store` whose dependent weapons go stale once this
    /// document is written: materials whose base power changes or that gain
    /// an edge, and weapons outside the document that gain an edge.
    fn affected_rows<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<(BTreeSet<MaterialId>, BTreeSet<WeaponId>), ArmoryError> {
        let mut materials = BTreeSet::new();
        for material in &self.materials {
            let changed = store
                .material(material.id)?
                .is_some_and(|existing| existing.base_power != material.base_power);
            if changed {
                materials.insert(material.id);
            }
        }
        for row in &self.material_compositions {
            let parent = MaterialId(row.parent_id);
            if store.material(parent)?.is_some() {
                materials.insert(parent);
            }
        }

        let imported: BTreeSet<WeaponId> = self.weapons.iter().map(|w| w.id).collect();
        let mut weapons = BTreeSet::new();
        for row in &self.weapon_compositions {
            let parent = WeaponId(row.parent_id);
            if !imported.contains(&parent) && store.weapon(parent)?.is_some() {
                weapons.insert(parent);
            }
        }

        Ok((materials, weapons))
    }

    fn check_qty(row: &CompositionRow) -> Result<(), ArmoryError> {
        if row.qty == 0 {
            return Err(ArmoryError::Validation(format!(
                "composition {} <- {} requires zero units",
                row.parent_id, row.material_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn document() -> CatalogDocument {
        CatalogDocument {
            materials: vec![
                Material::new(MaterialId(1), "Iron", Some(3), 10),
                Material::new(MaterialId(2), "Steel", Some(4), 0),
            ],
            weapons: vec![Weapon::new(WeaponId(1), "Excalibur", 0)],
            material_compositions: vec![CompositionRow {
                parent_id: 2,
                material_id: 1,
                qty: 2,
            }],
            weapon_compositions: vec![CompositionRow {
                parent_id: 1,
                material_id: 2,
                qty: 1,
            }],
        }
    }

    #[test]
    fn apply_writes_rows_and_edges() {
        let mut catalog = Catalog::new();
        let summary = document().apply_to(&mut catalog).expect("import");

        assert_eq!(summary.materials, 2);
        assert_eq!(summary.weapon_compositions, 1);
        assert_eq!(
            catalog.weapon_composition(WeaponId(1)).expect("read"),
            vec![Component::new(MaterialId(2), 1)]
        );
    }

    #[test]
    fn imported_power_level_is_not_trusted() {
        let mut doc = document();
        doc.weapons[0].power_level = PowerLevel::Known(999);

        let mut catalog = Catalog::new();
        doc.apply_to(&mut catalog).expect("import");
        let stored = catalog.weapon(WeaponId(1)).expect("read").expect("weapon");
        assert_eq!(stored.power_level, PowerLevel::Unknown);
    }

    #[test]
    fn dangling_edge_rejects_whole_document() {
        let mut doc = document();
        doc.weapon_compositions.push(CompositionRow {
            parent_id: 1,
            material_id: 77,
            qty: 1,
        });

        let mut catalog = Catalog::new();
        let result = doc.apply_to(&mut catalog);
        assert!(matches!(result, Err(ArmoryError::MaterialNotFound(MaterialId(77)))));
        assert_eq!(catalog.material_count().expect("count"), 0);
    }

    #[test]
    fn zero_quantity_edge_is_rejected() {
        let mut doc = document();
        doc.material_compositions[0].qty = 0;
        let result = doc.validate(&Catalog::new());
        assert!(matches!(result, Err(ArmoryError::Validation(_))));
    }

    #[test]
    fn edges_may_reference_existing_rows() {
        let mut catalog = Catalog::new();
        document().apply_to(&mut catalog).expect("first import");

        let followup = CatalogDocument {
            weapons: vec![Weapon::new(WeaponId(2), "Magic Staff", 0)],
            weapon_compositions: vec![CompositionRow {
                parent_id: 2,
                material_id: 1,
                qty: 1,
            }],
            ..CatalogDocument::default()
        };
        followup.apply_to(&mut catalog).expect("second import");
        assert_eq!(
            catalog.weapons_composed_of(MaterialId(1)).expect("read"),
            vec![WeaponId(2)]
        );
    }

    #[test]
    fn new_edge_on_existing_weapon_recomputes_it() {
        let mut catalog = Catalog::new();
        document().apply_to(&mut catalog).expect("first import");
        catalog
            .update_weapon_power_level(WeaponId(1), PowerLevel::Known(10))
            .expect("seed cache");

        // Excalibur gains three Iron directly: 10 + 3 * 3.
        let followup = CatalogDocument {
            weapon_compositions: vec![CompositionRow {
                parent_id: 1,
                material_id: 1,
                qty: 3,
            }],
            ..CatalogDocument::default()
        };
        let summary = followup.apply_to(&mut catalog).expect("second import");

        assert_eq!(summary.recomputed_weapons, 1);
        let stored = catalog.weapon(WeaponId(1)).expect("read").expect("weapon");
        assert_eq!(stored.power_level, PowerLevel::Known(19));
    }
}
