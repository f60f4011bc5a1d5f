//! # armory-core
//!
//! The composition-graph engine for Armory.
//!
//! Weapons are built from materials, and materials may themselves be built
//! from other materials. This crate resolves two aggregate values over that
//! graph and keeps the cached one consistent:
//! - **power level**: own base power plus the power of every component,
//!   weighted by required quantity
//! - **possible quantity**: units in stock plus units that can be built from
//!   the scarcest component
//! - **propagation**: a base power change recomputes every dependent weapon
//!
//! ## Architectural Constraints
//!
//! - Storage is reached only through the `CatalogStore` trait
//! - No async and no network dependencies; the app layer owns both
//! - Deterministic iteration: `BTreeMap`/`BTreeSet` only
//! - Sibling subtrees resolve in parallel on the rayon pool

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod formats;
pub mod node;
pub mod primitives;
pub mod propagation;
pub mod resolver;
pub mod service;
pub mod storage;
pub mod types;
pub mod workflow;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ArmoryError, Component, Material, MaterialFields, MaterialId, MaterialPatch, NodeKind,
    NodeRef, PowerLevel, Weapon, WeaponId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use catalog::{Catalog, CatalogStore};
pub use node::ComposableNode;
pub use propagation::{PropagationEngine, PropagationReport};
pub use resolver::{Ancestry, Resolver};
pub use service::{Armory, CatalogStatus};
pub use storage::RedbCatalog;
pub use workflow::{UpdateOutcome, UpdateWorkflow};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{CatalogDocument, CompositionRow, ImportSummary};
