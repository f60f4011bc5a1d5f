//! # Composition Resolver
//!
//! Recursive evaluation of a node's aggregate power level and of the number of
//! units that could be obtained from stock plus manufacturing.
//!
//! ## Traversal
//!
//! Every recursive call receives its own `Ancestry`: the set of materials on
//! the path from the root to the node. A child already in the ancestry is a
//! cycle and fails the whole resolution. Sibling subtrees are resolved in
//! parallel on the rayon pool and joined before the parent combines them; they
//! share only `&store` and never each other's ancestry.
//!
//! Resolution is a pure read. Nothing here writes to the store.

use crate::catalog::CatalogStore;
use crate::node::ComposableNode;
use crate::primitives::MAX_COMPOSITION_DEPTH;
use crate::{ArmoryError, Component, Material, MaterialId, NodeRef};
use rayon::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// ANCESTRY
// =============================================================================

/// Materials visited on the current root-to-node path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ancestry {
    path: BTreeSet<MaterialId>,
}

impl Ancestry {
    /// Ancestry of a resolution root. A material root is its own first ancestor.
    #[must_use]
    pub fn for_root(root: NodeRef) -> Self {
        let mut path = BTreeSet::new();
        if let NodeRef::Material(id) = root {
            path.insert(id);
        }
        Self { path }
    }

    #[must_use]
    pub fn contains(&self, id: MaterialId) -> bool {
        self.path.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Ancestry of `child`, or the reason the path cannot be extended.
    pub fn descend(&self, child: MaterialId) -> Result<Self, ArmoryError> {
        if self.path.contains(&child) {
            return Err(ArmoryError::CircularComposition(child));
        }
        if self.path.len() >= MAX_COMPOSITION_DEPTH {
            return Err(ArmoryError::DepthExceeded(MAX_COMPOSITION_DEPTH));
        }
        let mut path = self.path.clone();
        path.insert(child);
        Ok(Self { path })
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Evaluates derived values over a `CatalogStore`.
#[derive(Debug)]
pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> Resolver<'a, S>
where
    S: CatalogStore + Sync + ?Sized,
{
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Aggregate power level of the node at `root`.
    pub fn power_level(&self, root: NodeRef) -> Result<i64, ArmoryError> {
        match root {
            NodeRef::Material(id) => self.power_level_of(&self.root_material(id)?),
            NodeRef::Weapon(id) => {
                let weapon = self
                    .store
                    .weapon(id)?
                    .ok_or(ArmoryError::WeaponNotFound(id))?;
                self.power_level_of(&weapon)
            }
        }
    }

    /// Aggregate power level of an already fetched node, from a fresh ancestry.
    pub fn power_level_of<N: ComposableNode>(&self, node: &N) -> Result<i64, ArmoryError> {
        self.power_of(node, &Ancestry::for_root(node.node_ref()))
    }

    /// Units of the node at `root` available from stock plus manufacturing.
    pub fn possible_quantity(&self, root: NodeRef) -> Result<u64, ArmoryError> {
        match root {
            NodeRef::Material(id) => self.possible_quantity_of(&self.root_material(id)?),
            NodeRef::Weapon(id) => {
                let weapon = self
                    .store
                    .weapon(id)?
                    .ok_or(ArmoryError::WeaponNotFound(id))?;
                self.possible_quantity_of(&weapon)
            }
        }
    }

    /// Possible quantity of an already fetched node, from a fresh ancestry.
    pub fn possible_quantity_of<N: ComposableNode>(&self, node: &N) -> Result<u64, ArmoryError> {
        self.quantity_of(node, &Ancestry::for_root(node.node_ref()))
    }

    // =========================================================================
    // RECURSION
    // =========================================================================

    fn power_of<N: ComposableNode>(
        &self,
        node: &N,
        ancestry: &Ancestry,
    ) -> Result<i64, ArmoryError> {
        let parent = node.node_ref();
        let components = node.components(self.store)?;

        let contributions = components
            .par_iter()
            .map(|component| {
                let (child, child_ancestry) = self.enter(parent, *component, ancestry)?;
                let child_power = self.power_of(&child, &child_ancestry)?;
                let per_unit = i64::try_from(component.qty).unwrap_or(i64::MAX);
                Ok(child_power.saturating_mul(per_unit))
            })
            .collect::<Result<Vec<i64>, ArmoryError>>()?;

        Ok(contributions
            .into_iter()
            .fold(node.own_power(), i64::saturating_add))
    }

    fn quantity_of<N: ComposableNode>(
        &self,
        node: &N,
        ancestry: &Ancestry,
    ) -> Result<u64, ArmoryError> {
        let parent = node.node_ref();
        let components = node.components(self.store)?;
        if components.is_empty() {
            return Ok(node.stock());
        }

        let manufacturable = components
            .par_iter()
            .map(|component| {
                let (child, child_ancestry) = self.enter(parent, *component, ancestry)?;
                let available = self.quantity_of(&child, &child_ancestry)?;
                // `enter` has rejected zero quantities.
                Ok(available / component.qty)
            })
            .collect::<Result<Vec<u64>, ArmoryError>>()?;

        // The scarcest component bounds how many units can be built.
        let craftable = manufacturable.into_iter().min().unwrap_or(0);
        Ok(node.stock().saturating_add(craftable))
    }

    /// Cycle-check a component and fetch its row.
    ///
    /// A zero quantity or a missing row is reported as an invalid composition
    /// for both power and quantity resolution.
    fn enter(
        &self,
        parent: NodeRef,
        component: Component,
        ancestry: &Ancestry,
    ) -> Result<(Material, Ancestry), ArmoryError> {
        if component.qty == 0 {
            return Err(ArmoryError::InvalidComposition(format!(
                "{} requires zero units of {}",
                parent, component.material
            )));
        }
        let child_ancestry = ancestry.descend(component.material)?;
        let child = self.store.material(component.material)?.ok_or_else(|| {
            ArmoryError::InvalidComposition(format!(
                "{} lists missing {}",
                parent, component.material
            ))
        })?;
        Ok((child, child_ancestry))
    }

    fn root_material(&self, id: MaterialId) -> Result<Material, ArmoryError> {
        self.store
            .material(id)?
            .ok_or(ArmoryError::MaterialNotFound(id))
    }
}

// =============================================================================
// TESTS
// =============================================================================
