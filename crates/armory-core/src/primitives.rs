//! # Engine Limits
//!
//! Hardcoded runtime constants for the Armory engine.
//! These are compiled into the binary and are immutable at runtime.

/// Maximum number of materials on a single root-to-leaf composition path.
///
/// Resolution fails with `ArmoryError::DepthExceeded` beyond this bound,
/// keeping every recursive query computationally bounded.
pub const MAX_COMPOSITION_DEPTH: usize = 64;

/// Maximum length of a material or weapon name, in bytes.
pub const MAX_NAME_LENGTH: usize = 256;

/// Material fields that the update workflow is allowed to write.
///
/// The id is immutable and the deletion marker is only set by soft delete.
pub const UPDATABLE_MATERIAL_FIELDS: [&str; 3] = ["name", "base_power", "qty"];

/// Maximum number of rows of each kind in a single catalog import.
pub const MAX_IMPORT_ROWS: usize = 100_000;
