//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Resolution is CPU-bound and may fan out on the rayon pool, so every call
//! into the core runs on the blocking thread pool while holding an owned
//! lock guard.

use super::{
    AppState,
    types::{ApiError, HealthResponse, RowId, UpdateMaterialRequest, UpdateMaterialResponse},
};
use armory_core::{
    Armory, ArmoryError, CatalogStatus, Material, MaterialId, Weapon, WeaponId,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};

// =============================================================================
// LOCK HELPERS
// =============================================================================

/// Run `f` against a shared read guard on the blocking pool.
async fn with_read<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Armory) -> Result<T, ArmoryError> + Send + 'static,
{
    let guard = state.armory.clone().read_owned().await;
    tokio::task::spawn_blocking(move || f(&guard))
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {e}")))?
        .map_err(ApiError::from)
}

/// Run `f` against the exclusive write guard on the blocking pool.
async fn with_write<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Armory) -> Result<T, ArmoryError> + Send + 'static,
{
    let mut guard = state.armory.clone().write_owned().await;
    tokio::task::spawn_blocking(move || f(&mut guard))
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {e}")))?
        .map_err(ApiError::from)
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Catalog row counts.
pub async fn status_handler(State(state): State<AppState>) -> Result<Json<CatalogStatus>, ApiError> {
    with_read(&state, |armory| armory.status()).await.map(Json)
}

// =============================================================================
// MATERIALS
// =============================================================================

/// Fetch one material.
pub async fn get_material_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<Material>, ApiError> {
    with_read(&state, move |armory| armory.material(MaterialId(id)))
        .await
        .map(Json)
}

/// Units of a material available from stock plus manufacturing.
pub async fn material_max_quantity_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<u64>, ApiError> {
    with_read(&state, move |armory| armory.material_max_quantity(MaterialId(id)))
        .await
        .map(Json)
}

/// Effective power of a material.
pub async fn material_power_level_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<i64>, ApiError> {
    with_read(&state, move |armory| armory.material_power_level(MaterialId(id)))
        .await
        .map(Json)
}

/// Partial update of a material's whitelisted fields.
pub async fn update_material_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
    body: Result<Json<UpdateMaterialRequest>, JsonRejection>,
) -> Result<Json<UpdateMaterialResponse>, ApiError> {
    let Json(request) = body?;
    let patch = request.into_patch();
    let outcome = with_write(&state, move |armory| {
        armory.update_material(MaterialId(id), &patch)
    })
    .await?;

    Ok(Json(UpdateMaterialResponse {
        material: outcome.material,
        propagation: outcome.propagation,
    }))
}

/// Soft delete a material.
pub async fn delete_material_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<Material>, ApiError> {
    with_write(&state, move |armory| armory.delete_material(MaterialId(id)))
        .await
        .map(Json)
}

// =============================================================================
// WEAPONS
// =============================================================================

/// Fetch one weapon, computing its power level on first read.
///
/// A weapon with a known power level is served under the read lock; only an
/// unknown one takes the write lock to recompute and persist.
pub async fn get_weapon_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<Weapon>, ApiError> {
    let weapon_id = WeaponId(id);
    let stored = with_read(&state, move |armory| armory.peek_weapon(weapon_id)).await?;
    if stored.power_level.is_known() {
        return Ok(Json(stored));
    }

    with_write(&state, move |armory| armory.weapon(weapon_id))
        .await
        .map(Json)
}

/// Units of a weapon available from stock plus manufacturing.
pub async fn weapon_max_quantity_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<u64>, ApiError> {
    with_read(&state, move |armory| armory.weapon_max_quantity(WeaponId(id)))
        .await
        .map(Json)
}

/// Soft delete a weapon.
pub async fn delete_weapon_handler(
    State(state): State<AppState>,
    RowId(id): RowId,
) -> Result<Json<Weapon>, ApiError> {
    with_write(&state, move |armory| armory.delete_weapon(WeaponId(id)))
        .await
        .map(Json)
}
