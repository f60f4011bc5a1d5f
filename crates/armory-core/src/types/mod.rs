//! # Core Type Definitions
//!
//! This module contains the record types of the Armory catalog:
//! - Identifiers (`MaterialId`, `WeaponId`) and node addressing (`NodeRef`, `NodeKind`)
//! - Rows (`Material`, `Weapon`) and composition edges (`Component`)
//! - The cached derived value (`PowerLevel`)
//! - The whitelisted writable fields of a material (`MaterialFields`, `MaterialPatch`)
//! - Error types (`ArmoryError`)
//!
//! ## Arithmetic
//!
//! Stock quantities are `u64`, power values are `i64`. Every aggregate uses
//! saturating arithmetic; no floating point is used anywhere.

use crate::primitives::{MAX_NAME_LENGTH, UPDATABLE_MATERIAL_FIELDS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a material row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u64);

/// Identifier of a weapon row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeaponId(pub u64);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material #{}", self.0)
    }
}

impl fmt::Display for WeaponId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weapon #{}", self.0)
    }
}

/// The two kinds of node in the composition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Material,
    Weapon,
}

/// Address of a node in the composition graph.
///
/// Weapons are always roots; materials can be roots or components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeRef {
    Material(MaterialId),
    Weapon(WeaponId),
}

impl NodeRef {
    #[must_use]
    pub const fn kind(self) -> NodeKind {
        match self {
            Self::Material(_) => NodeKind::Material,
            Self::Weapon(_) => NodeKind::Weapon,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material(id) => id.fmt(f),
            Self::Weapon(id) => id.fmt(f),
        }
    }
}

// =============================================================================
// POWER LEVEL
// =============================================================================

/// Cached power level of a weapon.
///
/// `Unknown` covers both "never computed" and "last computation failed".
/// It is distinct from `Known(0)`, which is a valid result.
///
/// Serialized as a nullable integer so the stored and wire representation is
/// `null` for `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum PowerLevel {
    Known(i64),
    #[default]
    Unknown,
}

impl PowerLevel {
    #[must_use]
    pub const fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }

    #[must_use]
    pub const fn value(self) -> Option<i64> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }
}

impl From<Option<i64>> for PowerLevel {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl From<PowerLevel> for Option<i64> {
    fn from(level: PowerLevel) -> Self {
        level.value()
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// A raw or intermediate component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Authoritative input to power computation. `None` counts as 0.
    #[serde(default)]
    pub base_power: Option<i64>,
    /// Current stock.
    #[serde(default)]
    pub qty: u64,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Material {
    #[must_use]
    pub fn new(id: MaterialId, name: impl Into<String>, base_power: Option<i64>, qty: u64) -> Self {
        Self {
            id,
            name: name.into(),
            base_power,
            qty,
            deleted_at: None,
        }
    }

    /// Snapshot of the writable fields.
    #[must_use]
    pub fn fields(&self) -> MaterialFields {
        MaterialFields {
            name: self.name.clone(),
            base_power: self.base_power,
            qty: self.qty,
        }
    }

    /// Overwrite the writable fields, leaving id and deletion marker untouched.
    pub fn set_fields(&mut self, fields: MaterialFields) {
        self.name = fields.name;
        self.base_power = fields.base_power;
        self.qty = fields.qty;
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A crafted item. Always a composition root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: WeaponId,
    pub name: String,
    /// Cached derived value; see [`PowerLevel`].
    #[serde(default)]
    pub power_level: PowerLevel,
    #[serde(default)]
    pub qty: u64,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Weapon {
    #[must_use]
    pub fn new(id: WeaponId, name: impl Into<String>, qty: u64) -> Self {
        Self {
            id,
            name: name.into(),
            power_level: PowerLevel::Unknown,
            qty,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One composition edge as seen from its parent: `qty` units of `material`
/// are required per unit of the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Component {
    pub material: MaterialId,
    pub qty: u64,
}

impl Component {
    #[must_use]
    pub const fn new(material: MaterialId, qty: u64) -> Self {
        Self { material, qty }
    }
}

// =============================================================================
// WRITABLE FIELDS
// =============================================================================

/// The complete set of whitelisted material fields, as written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialFields {
    pub name: String,
    pub base_power: Option<i64>,
    pub qty: u64,
}

/// A partial update of the whitelisted material fields.
///
/// `base_power` is doubly optional: `None` leaves it untouched,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialPatch {
    pub name: Option<String>,
    pub base_power: Option<Option<i64>>,
    pub qty: Option<i64>,
}

impl MaterialPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.base_power.is_none() && self.qty.is_none()
    }

    /// Apply the patch on top of `current`, validating every provided value.
    pub fn apply(&self, current: &MaterialFields) -> Result<MaterialFields, ArmoryError> {
        if self.is_empty() {
            return Err(ArmoryError::Validation(format!(
                "update contains no writable field ({})",
                UPDATABLE_MATERIAL_FIELDS.join(", ")
            )));
        }

        let mut next = current.clone();

        if let Some(name) = &self.name {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(ArmoryError::Validation("name must not be empty".to_string()));
            }
            if trimmed.len() > MAX_NAME_LENGTH {
                return Err(ArmoryError::Validation(format!(
                    "name length {} exceeds maximum {} bytes",
                    trimmed.len(),
                    MAX_NAME_LENGTH
                )));
            }
            next.name = trimmed.to_string();
        }

        if let Some(base_power) = self.base_power {
            next.base_power = base_power;
        }

        if let Some(qty) = self.qty {
            next.qty = u64::try_from(qty).map_err(|_| {
                ArmoryError::Validation(format!("qty must be non-negative, got {}", qty))
            })?;
        }

        Ok(next)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Armory engine.
///
/// Only the propagation path converts resolution failures into
/// `PowerLevel::Unknown`; every other caller receives these unchanged.
#[derive(Debug, Error)]
pub enum ArmoryError {
    /// A material reappeared in its own ancestry during resolution.
    #[error("Circular composition detected at {0}")]
    CircularComposition(MaterialId),

    /// The requested material does not exist.
    #[error("Not found: {0}")]
    MaterialNotFound(MaterialId),

    /// The requested weapon does not exist.
    #[error("Not found: {0}")]
    WeaponNotFound(WeaponId),

    /// Input was structurally invalid or carried no usable field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stored composition data cannot be resolved (zero quantity, dangling edge).
    #[error("Invalid composition: {0}")]
    InvalidComposition(String),

    /// The composition chain is deeper than the resolver allows.
    #[error("Composition depth exceeds {0} levels")]
    DepthExceeded(usize),

    /// The underlying store failed to read or write.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A stored row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ArmoryError {
    /// True for errors caused by the shape of the composition graph.
    #[must_use]
    pub const fn is_composition_failure(&self) -> bool {
        matches!(
            self,
            Self::CircularComposition(_) | Self::InvalidComposition(_) | Self::DepthExceeded(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
