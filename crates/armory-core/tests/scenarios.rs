//! # Catalog Scenario Tests
//!
//! End-to-end behaviour of the resolver, the propagation engine and the update
//! workflow, grouped by concern. Every group runs against the in-memory
//! `Catalog`, wrapped where needed in a store that counts power-level writes
//! or serves edges the catalog itself would refuse.

use armory_core::{
    Armory, ArmoryError, Catalog, CatalogDocument, CatalogStore, Component, CompositionRow,
    Material, MaterialFields, MaterialId, MaterialPatch, NodeRef, PowerLevel, PropagationEngine,
    Resolver, UpdateWorkflow, Weapon, WeaponId,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

// =============================================================================
// FIXTURES
// =============================================================================

fn material(catalog: &mut Catalog, id: u64, base_power: Option<i64>, qty: u64) {
    catalog
        .insert_material(Material::new(MaterialId(id), format!("material-{id}"), base_power, qty))
        .expect("insert material");
}

fn weapon(catalog: &mut Catalog, id: u64, qty: u64) {
    catalog
        .insert_weapon(Weapon::new(WeaponId(id), format!("weapon-{id}"), qty))
        .expect("insert weapon");
}

fn material_edge(catalog: &mut Catalog, parent: u64, child: u64, qty: u64) {
    catalog
        .insert_material_edge(MaterialId(parent), Component::new(MaterialId(child), qty))
        .expect("insert material edge");
}

fn weapon_edge(catalog: &mut Catalog, parent: u64, child: u64, qty: u64) {
    catalog
        .insert_weapon_edge(WeaponId(parent), Component::new(MaterialId(child), qty))
        .expect("insert weapon edge");
}

fn weapon_power<S: CatalogStore + Sync>(store: &S, id: u64) -> Result<i64, ArmoryError> {
    Resolver::new(store).power_level(NodeRef::Weapon(WeaponId(id)))
}

/// Delegating store that records every write.
///
/// `extra_edges` are appended to a weapon's composition on read without
/// passing the catalog's insert checks, standing in for rows that were
/// corrupted at rest.
#[derive(Debug, Default)]
struct RecordingStore {
    inner: Catalog,
    extra_edges: BTreeMap<WeaponId, Vec<Component>>,
    power_writes: Vec<(WeaponId, PowerLevel)>,
    field_writes: usize,
}

impl RecordingStore {
    fn new(inner: Catalog) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn with_extra_edge(mut self, weapon: u64, component: Component) -> Self {
        self.extra_edges
            .entry(WeaponId(weapon))
            .or_default()
            .push(component);
        self
    }
}

impl CatalogStore for RecordingStore {
    fn material(&self, id: MaterialId) -> Result<Option<Material>, ArmoryError> {
        self.inner.material(id)
    }

    fn weapon(&self, id: WeaponId) -> Result<Option<Weapon>, ArmoryError> {
        self.inner.weapon(id)
    }

    fn material_composition(&self, parent: MaterialId) -> Result<Vec<Component>, ArmoryError> {
        self.inner.material_composition(parent)
    }

    fn weapon_composition(&self, parent: WeaponId) -> Result<Vec<Component>, ArmoryError> {
        let mut components = self.inner.weapon_composition(parent)?;
        if let Some(extra) = self.extra_edges.get(&parent) {
            components.extend(extra.iter().copied());
        }
        Ok(components)
    }

    fn materials_composed_of(&self, material: MaterialId) -> Result<Vec<MaterialId>, ArmoryError> {
        self.inner.materials_composed_of(material)
    }

    fn weapons_composed_of(&self, material: MaterialId) -> Result<Vec<WeaponId>, ArmoryError> {
        let mut weapons = self.inner.weapons_composed_of(material)?;
        for (weapon, extra) in &self.extra_edges {
            if extra.iter().any(|c| c.material == material) && !weapons.contains(weapon) {
                weapons.push(*weapon);
            }
        }
        Ok(weapons)
    }

    fn update_material_fields(
        &mut self,
        id: MaterialId,
        fields: &MaterialFields,
    ) -> Result<(), ArmoryError> {
        self.field_writes += 1;
        self.inner.update_material_fields(id, fields)
    }

    fn update_weapon_power_level(
        &mut self,
        id: WeaponId,
        level: PowerLevel,
    ) -> Result<(), ArmoryError> {
        self.power_writes.push((id, level));
        self.inner.update_weapon_power_level(id, level)
    }

    fn insert_material(&mut self, material: Material) -> Result<(), ArmoryError> {
        self.inner.insert_material(material)
    }

    fn insert_weapon(&mut self, weapon: Weapon) -> Result<(), ArmoryError> {
        self.inner.insert_weapon(weapon)
    }

    fn insert_material_edge(
        &mut self,
        parent: MaterialId,
        component: Component,
    ) -> Result<(), ArmoryError> {
        self.inner.insert_material_edge(parent, component)
    }

    fn insert_weapon_edge(
        &mut self,
        parent: WeaponId,
        component: Component,
    ) -> Result<(), ArmoryError> {
        self.inner.insert_weapon_edge(parent, component)
    }

    fn soft_delete_material(
        &mut self,
        id: MaterialId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError> {
        self.inner.soft_delete_material(id, at)
    }

    fn soft_delete_weapon(
        &mut self,
        id: WeaponId,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ArmoryError> {
        self.inner.soft_delete_weapon(id, at)
    }

    fn material_count(&self) -> Result<usize, ArmoryError> {
        self.inner.material_count()
    }

    fn weapon_count(&self) -> Result<usize, ArmoryError> {
        self.inner.weapon_count()
    }
}

// =============================================================================
// POWER LEVEL
// =============================================================================

mod power_level {
    use super::*;

    /// Material root with no components and null base power.
    #[test]
    fn bare_material_with_null_base_power_is_zero() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, None, 0);

        let power = Resolver::new(&catalog)
            .power_level(NodeRef::Material(MaterialId(1)))
            .expect("power");
        assert_eq!(power, 0);
    }

    /// Weapon made of one A(5) and one B(3).
    #[test]
    fn weapon_sums_its_components() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(5), 0);
        material(&mut catalog, 2, Some(3), 0);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);
        weapon_edge(&mut catalog, 1, 2, 1);

        assert_eq!(weapon_power(&catalog, 1).expect("power"), 8);
    }

    /// A = base(A) + 2 x C(2); a weapon made of one A has the same power.
    #[test]
    fn nested_material_is_weighted_by_quantity() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(7), 0);
        material(&mut catalog, 3, Some(2), 0);
        material_edge(&mut catalog, 1, 3, 2);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);

        let a = Resolver::new(&catalog)
            .power_level(NodeRef::Material(MaterialId(1)))
            .expect("power");
        assert_eq!(a, 11);
        assert_eq!(weapon_power(&catalog, 1).expect("power"), a);
    }

    /// The same material reached through two branches is not a cycle.
    #[test]
    fn shared_component_counts_once_per_path() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(1), 0);
        material(&mut catalog, 2, Some(0), 0);
        material(&mut catalog, 3, Some(0), 0);
        material_edge(&mut catalog, 2, 1, 1);
        material_edge(&mut catalog, 3, 1, 1);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 2, 1);
        weapon_edge(&mut catalog, 1, 3, 1);

        assert_eq!(weapon_power(&catalog, 1).expect("power"), 2);
    }
}

// =============================================================================
// CYCLE DETECTION
// =============================================================================

mod cycles {
    use super::*;

    /// A material that lists itself.
    #[test]
    fn direct_self_reference_fails() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(5), 0);
        material_edge(&mut catalog, 1, 1, 1);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);

        let result = weapon_power(&catalog, 1);
        assert!(matches!(result, Err(ArmoryError::CircularComposition(MaterialId(1)))));
    }

    /// A -> B -> A, reached from a weapon.
    #[test]
    fn transitive_cycle_fails() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(5), 0);
        material(&mut catalog, 2, Some(5), 0);
        material_edge(&mut catalog, 1, 2, 1);
        material_edge(&mut catalog, 2, 1, 1);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);

        assert!(matches!(
            weapon_power(&catalog, 1),
            Err(ArmoryError::CircularComposition(_))
        ));
        assert!(matches!(
            Resolver::new(&catalog).possible_quantity(NodeRef::Weapon(WeaponId(1))),
            Err(ArmoryError::CircularComposition(_))
        ));
    }

    /// Only one branch is cyclic; the whole resolution still fails.
    #[test]
    fn one_cyclic_branch_fails_everything() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(5), 0);
        material(&mut catalog, 2, Some(5), 0);
        material(&mut catalog, 3, Some(5), 0);
        material_edge(&mut catalog, 3, 3, 1);
        weapon(&mut catalog, 1, 0);
        for child in 1..=3 {
            weapon_edge(&mut catalog, 1, child, 1);
        }

        assert!(matches!(
            weapon_power(&catalog, 1),
            Err(ArmoryError::CircularComposition(MaterialId(3)))
        ));
    }

    /// Resolution never writes, even when it fails.
    #[test]
    fn failed_resolution_writes_nothing() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(5), 0);
        material_edge(&mut catalog, 1, 1, 1);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);
        let store = RecordingStore::new(catalog);

        assert!(weapon_power(&store, 1).is_err());
        assert!(store.power_writes.is_empty());
        assert_eq!(store.field_writes, 0);
    }
}

// =============================================================================
// POSSIBLE QUANTITY
// =============================================================================

mod possible_quantity {
    use super::*;

    /// Weapon needs 3 x X; X has 2 in stock and is built from 1 x Y (10 in stock).
    #[test]
    fn stock_plus_manufacturable() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, None, 2);
        material(&mut catalog, 2, None, 10);
        material_edge(&mut catalog, 1, 2, 1);
        weapon(&mut catalog, 1, 1);
        weapon_edge(&mut catalog, 1, 1, 3);

        let resolver = Resolver::new(&catalog);
        assert_eq!(
            resolver
                .possible_quantity(NodeRef::Material(MaterialId(1)))
                .expect("qty"),
            12
        );
        assert_eq!(
            resolver
                .possible_quantity(NodeRef::Weapon(WeaponId(1)))
                .expect("qty"),
            1 + 4
        );
    }

    /// The scarcest component bounds the result.
    #[test]
    fn scarcest_component_wins() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, None, 100);
        material(&mut catalog, 2, None, 7);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 10);
        weapon_edge(&mut catalog, 1, 2, 2);

        let qty = Resolver::new(&catalog)
            .possible_quantity(NodeRef::Weapon(WeaponId(1)))
            .expect("qty");
        assert_eq!(qty, 3);
    }

    /// A leaf material can only be taken from stock.
    #[test]
    fn leaf_returns_stock() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(1), 42);

        let qty = Resolver::new(&catalog)
            .possible_quantity(NodeRef::Material(MaterialId(1)))
            .expect("qty");
        assert_eq!(qty, 42);
    }
}

// =============================================================================
// PROPAGATION
// =============================================================================

mod propagation {
    use super::*;

    /// Leaf 1 feeds 2 feeds 3; weapons hang off every level; weapon 4 is unrelated.
    fn tower() -> Catalog {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(1), 0);
        material(&mut catalog, 2, Some(2), 0);
        material(&mut catalog, 3, Some(3), 0);
        material(&mut catalog, 4, Some(4), 0);
        material_edge(&mut catalog, 2, 1, 2);
        material_edge(&mut catalog, 3, 2, 2);
        for id in 1..=4 {
            weapon(&mut catalog, id, 0);
            weapon_edge(&mut catalog, id, id, 1);
        }
        catalog
    }

    /// Every dependent weapon ends up equal to a fresh resolution.
    #[test]
    fn base_power_change_reaches_every_dependent() {
        let mut store = RecordingStore::new(tower());
        let patch = MaterialPatch {
            base_power: Some(Some(10)),
            ..MaterialPatch::default()
        };

        let outcome =
            UpdateWorkflow::update_material(&mut store, MaterialId(1), &patch).expect("update");
        let report = outcome.propagation.expect("propagation ran");
        assert_eq!(report.examined, 3);

        for id in 1..=3 {
            let stored = store.weapon(WeaponId(id)).expect("read").expect("row");
            let fresh = weapon_power(&store, id).expect("power");
            assert_eq!(stored.power_level, PowerLevel::Known(fresh));
        }
        let unrelated = store.weapon(WeaponId(4)).expect("read").expect("row");
        assert_eq!(unrelated.power_level, PowerLevel::Unknown);
        assert!(!store.power_writes.iter().any(|(id, _)| *id == WeaponId(4)));
    }

    /// Re-sending the same base power writes the row but recomputes nothing.
    #[test]
    fn unchanged_base_power_is_idempotent() {
        let mut store = RecordingStore::new(tower());
        let patch = MaterialPatch {
            base_power: Some(Some(1)),
            ..MaterialPatch::default()
        };

        let outcome =
            UpdateWorkflow::update_material(&mut store, MaterialId(1), &patch).expect("update");
        assert!(outcome.propagation.is_none());
        assert_eq!(store.field_writes, 1);
        assert!(store.power_writes.is_empty());
    }

    /// Changing stock never touches cached power levels.
    #[test]
    fn qty_update_triggers_no_recompute() {
        let mut store = RecordingStore::new(tower());
        let patch = MaterialPatch {
            qty: Some(99),
            ..MaterialPatch::default()
        };

        let outcome =
            UpdateWorkflow::update_material(&mut store, MaterialId(1), &patch).expect("update");
        assert!(outcome.propagation.is_none());
        assert!(store.power_writes.is_empty());
    }

    /// Running propagation twice writes only on the first run.
    #[test]
    fn second_propagation_writes_nothing() {
        let mut store = RecordingStore::new(tower());
        PropagationEngine::propagate(&mut store, MaterialId(1)).expect("first");
        let after_first = store.power_writes.len();
        assert_eq!(after_first, 3);

        let report = PropagationEngine::propagate(&mut store, MaterialId(1)).expect("second");
        assert!(report.updated.is_empty());
        assert_eq!(store.power_writes.len(), after_first);
    }

    /// A cycle introduced below a weapon stores unknown instead of failing.
    #[test]
    fn cyclic_dependent_degrades_to_unknown() {
        let mut catalog = tower();
        catalog
            .update_weapon_power_level(WeaponId(3), PowerLevel::Known(1))
            .expect("seed");
        material_edge(&mut catalog, 1, 3, 1);
        let mut store = RecordingStore::new(catalog);

        let patch = MaterialPatch {
            base_power: Some(Some(5)),
            ..MaterialPatch::default()
        };
        let outcome =
            UpdateWorkflow::update_material(&mut store, MaterialId(2), &patch).expect("update");
        let report = outcome.propagation.expect("propagation ran");
        assert!(report.degraded.contains(&WeaponId(3)));

        let stored = store.weapon(WeaponId(3)).expect("read").expect("row");
        assert_eq!(stored.power_level, PowerLevel::Unknown);
    }
}

// =============================================================================
// SOFT DELETE
// =============================================================================

mod soft_delete {
    use super::*;

    /// Deleted materials still contribute to the weapons built from them.
    #[test]
    fn deleted_material_still_participates() {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(6), 4);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 2);
        let mut armory = Armory::with_catalog(catalog);

        let deleted = armory.delete_material(MaterialId(1)).expect("delete");
        assert!(deleted.is_deleted());

        let weapon = armory.weapon(WeaponId(1)).expect("weapon");
        assert_eq!(weapon.power_level, PowerLevel::Known(12));
        assert_eq!(armory.weapon_max_quantity(WeaponId(1)).expect("qty"), 2);
    }

    /// Deleted rows stay readable by id.
    #[test]
    fn deleted_weapon_is_still_readable() {
        let mut catalog = Catalog::new();
        weapon(&mut catalog, 1, 3);
        let mut armory = Armory::with_catalog(catalog);

        armory.delete_weapon(WeaponId(1)).expect("delete");
        let weapon = armory.peek_weapon(WeaponId(1)).expect("read");
        assert!(weapon.is_deleted());
        assert_eq!(weapon.qty, 3);
    }
}

// =============================================================================
// MALFORMED GRAPHS
// =============================================================================

mod malformed_graphs {
    use super::*;

    /// Weapon 1 is built from one material 1 and has a cached power of 100.
    fn single_part() -> Catalog {
        let mut catalog = Catalog::new();
        material(&mut catalog, 1, Some(5), 10);
        material(&mut catalog, 2, Some(3), 4);
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);
        catalog
            .update_weapon_power_level(WeaponId(1), PowerLevel::Known(100))
            .expect("seed");
        catalog
    }

    /// m1 <- m2 <- ... <- m(len), with weapon 1 built from m1.
    fn chain(len: u64) -> Catalog {
        let mut catalog = Catalog::new();
        for id in 1..=len {
            material(&mut catalog, id, Some(1), 1);
        }
        for id in 1..len {
            material_edge(&mut catalog, id, id + 1, 1);
        }
        weapon(&mut catalog, 1, 0);
        weapon_edge(&mut catalog, 1, 1, 1);
        catalog
            .update_weapon_power_level(WeaponId(1), PowerLevel::Known(1))
            .expect("seed");
        catalog
    }

    fn assert_degraded(store: &mut RecordingStore, origin: u64) {
        let report = PropagationEngine::propagate(store, MaterialId(origin)).expect("propagate");
        assert_eq!(report.degraded, vec![WeaponId(1)]);
        assert_eq!(report.updated, vec![WeaponId(1)]);

        let stored = store.weapon(WeaponId(1)).expect("read").expect("row");
        assert_eq!(stored.power_level, PowerLevel::Unknown);
    }

    /// A zero-quantity edge read back from storage.
    #[test]
    fn zero_quantity_edge_is_invalid() {
        let mut store =
            RecordingStore::new(single_part()).with_extra_edge(1, Component::new(MaterialId(2), 0));

        assert!(matches!(
            weapon_power(&store, 1),
            Err(ArmoryError::InvalidComposition(_))
        ));
        assert!(matches!(
            Resolver::new(&store).possible_quantity(NodeRef::Weapon(WeaponId(1))),
            Err(ArmoryError::InvalidComposition(_))
        ));
        assert_degraded(&mut store, 2);
    }

    /// An edge pointing at a material row that does not exist.
    #[test]
    fn dangling_edge_is_invalid() {
        let mut store =
            RecordingStore::new(single_part()).with_extra_edge(1, Component::new(MaterialId(99), 1));

        assert!(matches!(
            weapon_power(&store, 1),
            Err(ArmoryError::InvalidComposition(_))
        ));
        assert!(matches!(
            Resolver::new(&store).possible_quantity(NodeRef::Weapon(WeaponId(1))),
            Err(ArmoryError::InvalidComposition(_))
        ));
        assert_degraded(&mut store, 1);
    }

    /// 64 materials below a weapon is the deepest chain that still resolves.
    #[test]
    fn deepest_allowed_chain_resolves() {
        let catalog = chain(64);
        assert_eq!(weapon_power(&catalog, 1).expect("power"), 64);
        assert_eq!(
            Resolver::new(&catalog)
                .possible_quantity(NodeRef::Weapon(WeaponId(1)))
                .expect("qty"),
            64
        );
    }

    /// One more level exceeds the depth bound.
    #[test]
    fn overlong_chain_exceeds_depth() {
        let mut store = RecordingStore::new(chain(65));

        assert!(matches!(
            weapon_power(&store, 1),
            Err(ArmoryError::DepthExceeded(64))
        ));
        assert!(matches!(
            Resolver::new(&store).possible_quantity(NodeRef::Weapon(WeaponId(1))),
            Err(ArmoryError::DepthExceeded(64))
        ));
        assert_degraded(&mut store, 65);
    }
}

// =============================================================================
// IMPORT
// =============================================================================

mod import {
    use super::*;

    /// Iron(5) x2 -> Blade(1) -> Sword, with a bogus cached power on the sword.
    fn forge_document() -> CatalogDocument {
        CatalogDocument {
            materials: vec![
                Material::new(MaterialId(1), "Iron", Some(5), 10),
                Material::new(MaterialId(2), "Blade", Some(1), 0),
            ],
            weapons: vec![Weapon {
                power_level: PowerLevel::Known(999),
                ..Weapon::new(WeaponId(1), "Sword", 0)
            }],
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

    /// The document's cached power level is never served.
    #[test]
    fn imported_power_level_is_recomputed() {
        let mut armory = Armory::new();
        armory.import(&forge_document()).expect("import");

        let stored = armory.peek_weapon(WeaponId(1)).expect("read");
        assert_eq!(stored.power_level, PowerLevel::Unknown);

        let sword = armory.weapon(WeaponId(1)).expect("weapon");
        assert_eq!(sword.power_level, PowerLevel::Known(11));
    }

    /// Re-importing a material with a new base power refreshes cached weapons.
    #[test]
    fn reimported_base_power_propagates() {
        let mut armory = Armory::new();
        armory.import(&forge_document()).expect("first import");
        assert_eq!(
            armory.weapon(WeaponId(1)).expect("weapon").power_level,
            PowerLevel::Known(11)
        );

        let iron_only = CatalogDocument {
            materials: vec![Material::new(MaterialId(1), "Iron", Some(50), 10)],
            ..CatalogDocument::default()
        };
        let summary = armory.import(&iron_only).expect("second import");
        assert_eq!(summary.recomputed_weapons, 1);

        let stored = armory.peek_weapon(WeaponId(1)).expect("read");
        assert_eq!(stored.power_level, PowerLevel::Known(101));
    }

    /// Re-importing identical rows leaves cached values alone.
    #[test]
    fn unchanged_reimport_recomputes_nothing() {
        let mut armory = Armory::new();
        let document = CatalogDocument {
            weapons: Vec::new(),
            weapon_compositions: Vec::new(),
            ..forge_document()
        };
        armory.import(&forge_document()).expect("first import");
        armory.weapon(WeaponId(1)).expect("cache power");

        let summary = armory.import(&document).expect("second import");
        assert_eq!(summary.recomputed_weapons, 0);
        assert_eq!(
            armory.peek_weapon(WeaponId(1)).expect("read").power_level,
            PowerLevel::Known(11)
        );
    }
}
