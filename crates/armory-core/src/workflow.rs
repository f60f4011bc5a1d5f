//! # Update Workflow
//!
//! Field updates on catalog rows.
//!
//! Only whitelisted material fields are written. The stored base power is read
//! before the write and compared afterwards; propagation runs only when it
//! changed, and only after the material row has been written, because the
//! resolver reads live store data.

use crate::catalog::CatalogStore;
use crate::propagation::{PropagationEngine, PropagationReport};
use crate::{ArmoryError, Material, MaterialId, MaterialPatch};

/// Result of a material update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The material as stored after the update.
    pub material: Material,
    /// Present when the base power changed and dependents were recomputed.
    pub propagation: Option<PropagationReport>,
}

/// Orchestrates entity updates and conditional propagation.
pub struct UpdateWorkflow;

impl UpdateWorkflow {
    /// Apply `patch` to the material `id`.
    pub fn update_material<S: CatalogStore + Sync + ?Sized>(
        store: &mut S,
        id: MaterialId,
        patch: &MaterialPatch,
    ) -> Result<UpdateOutcome, ArmoryError> {
        let current = store
            .material(id)?
            .ok_or(ArmoryError::MaterialNotFound(id))?;

        let fields = patch.apply(&current.fields())?;
        store.update_material_fields(id, &fields)?;

        let mut updated = current.clone();
        updated.set_fields(fields);

        let propagation = if updated.base_power != current.base_power {
            tracing::debug!(
                material = id.0,
                old = ?current.base_power,
                new = ?updated.base_power,
                "base power changed"
            );
            Some(PropagationEngine::propagate(store, id)?)
        } else {
            None
        };

        Ok(UpdateOutcome {
            material: updated,
            propagation,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
