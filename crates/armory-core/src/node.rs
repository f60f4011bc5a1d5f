//! # Composable Nodes
//!
//! The capability shared by materials and weapons. The resolver is written
//! against this trait only, so neither row type needs to know about the other.

use crate::catalog::CatalogStore;
use crate::{ArmoryError, Component, Material, NodeKind, NodeRef, Weapon};

/// A node of the composition graph.
pub trait ComposableNode {
    /// Address of this node.
    fn node_ref(&self) -> NodeRef;

    fn kind(&self) -> NodeKind {
        self.node_ref().kind()
    }

    /// Power contributed by the node itself, before any component.
    fn own_power(&self) -> i64;

    /// Units already in stock.
    fn stock(&self) -> u64;

    /// Direct components of this node.
    fn components<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<Component>, ArmoryError>;
}

impl ComposableNode for Material {
    fn node_ref(&self) -> NodeRef {
        NodeRef::Material(self.id)
    }

    fn own_power(&self) -> i64 {
        self.base_power.unwrap_or(0)
    }

    fn stock(&self) -> u64 {
        self.qty
    }

    fn components<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<Component>, ArmoryError> {
        store.material_composition(self.id)
    }
}

impl ComposableNode for Weapon {
    fn node_ref(&self) -> NodeRef {
        NodeRef::Weapon(self.id)
    }

    // Weapons only aggregate; they carry no power of their own.
    fn own_power(&self) -> i64 {
        0
    }

    fn stock(&self) -> u64 {
        self.qty
    }

    fn components<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<Component>, ArmoryError> {
        store.weapon_composition(self.id)
    }
}
