//! # Propagation Engine
//!
//! Keeps cached weapon power levels in step with material base power.
//!
//! When a material's base power changes, every weapon that depends on it,
//! directly or through any chain of intermediate materials, is recomputed
//! and its stored power level rewritten if the value moved.
//!
//! A weapon whose recomputation fails (cycle, dangling edge, depth) is stored
//! as `PowerLevel::Unknown` instead of failing the batch. This is the only
//! place in the engine where a resolution error is absorbed.

use crate::catalog::CatalogStore;
use crate::resolver::Resolver;
use crate::{ArmoryError, MaterialId, PowerLevel, Weapon, WeaponId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Summary of one propagation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationReport {
    /// The material whose change triggered the run.
    pub material: MaterialId,
    /// Weapons recomputed.
    pub examined: usize,
    /// Weapons whose stored power level was rewritten.
    pub updated: Vec<WeaponId>,
    /// Weapons now stored as unknown because resolution failed.
    pub degraded: Vec<WeaponId>,
}

impl PropagationReport {
    fn new(material: MaterialId) -> Self {
        Self {
            material,
            examined: 0,
            updated: Vec::new(),
            degraded: Vec::new(),
        }
    }
}

/// Upward traversal and forced recomputation of dependent weapons.
pub struct PropagationEngine;

impl PropagationEngine {
    /// Every weapon whose power level depends on `material`, keyed by id.
    ///
    /// Walks the reverse composition edges from `material` upwards. A weapon
    /// reachable through several paths appears once. The walk keeps a visited
    /// set, so a cyclic material graph terminates.
    pub fn associated_weapons<S: CatalogStore + ?Sized>(
        store: &S,
        material: MaterialId,
    ) -> Result<BTreeMap<WeaponId, Weapon>, ArmoryError> {
        let mut weapons = BTreeMap::new();
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        visited.insert(material);
        queue.push_back(material);

        while let Some(current) = queue.pop_front() {
            for weapon_id in store.weapons_composed_of(current)? {
                if weapons.contains_key(&weapon_id) {
                    continue;
                }
                if let Some(weapon) = store.weapon(weapon_id)? {
                    weapons.insert(weapon_id, weapon);
                }
            }

            for parent in store.materials_composed_of(current)? {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(weapons)
    }

    /// Resolve a weapon's power level, degrading any failure to `Unknown`.
    pub fn recompute<S: CatalogStore + Sync + ?Sized>(store: &S, weapon: &Weapon) -> PowerLevel {
        match Resolver::new(store).power_level_of(weapon) {
            Ok(level) => PowerLevel::Known(level),
            Err(e) if e.is_composition_failure() => {
                tracing::warn!(
                    weapon = weapon.id.0,
                    error = %e,
                    "power level could not be resolved, storing unknown"
                );
                PowerLevel::Unknown
            }
            Err(e) => {
                tracing::error!(
                    weapon = weapon.id.0,
                    error = %e,
                    "power level resolution failed on a read, storing unknown"
                );
                PowerLevel::Unknown
            }
        }
    }

    /// Recompute a weapon's power level and persist it if it changed.
    ///
    /// Storage failures are returned; resolution failures are not.
    pub fn force_recompute<S: CatalogStore + Sync + ?Sized>(
        store: &mut S,
        weapon: &Weapon,
    ) -> Result<PowerLevel, ArmoryError> {
        let level = Self::recompute(&*store, weapon);
        Self::persist(store, weapon, level)?;
        Ok(level)
    }

    /// Recompute every weapon associated with `material`.
    ///
    /// Recomputations run in parallel against a shared read-only view; the
    /// resulting writes are applied afterwards, one weapon at a time.
    pub fn propagate<S: CatalogStore + Sync + ?Sized>(
        store: &mut S,
        material: MaterialId,
    ) -> Result<PropagationReport, ArmoryError> {
        let weapons: Vec<Weapon> = Self::associated_weapons(&*store, material)?
            .into_values()
            .collect();

        let recomputed: Vec<(Weapon, PowerLevel)> = {
            let reader = &*store;
            weapons
                .into_par_iter()
                .map(|weapon| {
                    let level = Self::recompute(reader, &weapon);
                    (weapon, level)
                })
                .collect()
        };

        let mut report = PropagationReport::new(material);
        for (weapon, level) in recomputed {
            report.examined += 1;
            if !level.is_known() {
                report.degraded.push(weapon.id);
            }
            if Self::persist(store, &weapon, level)? {
                report.updated.push(weapon.id);
            }
        }

        tracing::info!(
            material = material.0,
            examined = report.examined,
            updated = report.updated.len(),
            degraded = report.degraded.len(),
            "propagated base power change"
        );
        Ok(report)
    }

    /// Write `level` unless it equals the stored value. Returns whether a write happened.
    fn persist<S: CatalogStore + ?Sized>(
        store: &mut S,
        weapon: &Weapon,
        level: PowerLevel,
    ) -> Result<bool, ArmoryError> {
        if weapon.power_level == level {
            tracing::debug!(weapon = weapon.id.0, "power level unchanged, skipping write");
            return Ok(false);
        }
        store.update_weapon_power_level(weapon.id, level)?;
        Ok(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================
