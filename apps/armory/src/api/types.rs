//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Material and weapon rows are serialized directly from their core types.

use armory_core::{
    ArmoryError, Material, MaterialPatch, PropagationReport, primitives::UPDATABLE_MATERIAL_FIELDS,
};
use axum::{
    Json,
    extract::{
        FromRequestParts, Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// UPDATE MATERIAL REQUEST/RESPONSE
// =============================================================================

/// Body of `PUT /materials/{id}`.
///
/// Keys other than the whitelisted fields are accepted and ignored.
/// `base_power: null` clears the base power; omitting it leaves it unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMaterialRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub base_power: Option<Option<i64>>,
    #[serde(default)]
    pub qty: Option<i64>,
    #[serde(flatten)]
    pub ignored: BTreeMap<String, serde_json::Value>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing key (`None`).
fn present_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<i64>>, D::Error> {
    Option::<i64>::deserialize(d).map(Some)
}

impl UpdateMaterialRequest {
    /// Convert to a core patch, logging every key that is not writable.
    pub fn into_patch(self) -> MaterialPatch {
        for key in self.ignored.keys() {
            tracing::debug!(
                key = %key,
                writable = ?UPDATABLE_MATERIAL_FIELDS,
                "ignoring non-writable material field"
            );
        }
        MaterialPatch {
            name: self.name,
            base_power: self.base_power,
            qty: self.qty,
        }
    }
}

/// Body returned by `PUT /materials/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMaterialResponse {
    pub material: Material,
    pub propagation: Option<PropagationReport>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

/// HTTP status for a core error.
#[must_use]
pub fn status_for(error: &ArmoryError) -> StatusCode {
    match error {
        ArmoryError::MaterialNotFound(_) | ArmoryError::WeaponNotFound(_) => StatusCode::NOT_FOUND,
        ArmoryError::Validation(_) => StatusCode::BAD_REQUEST,
        ArmoryError::CircularComposition(_)
        | ArmoryError::InvalidComposition(_)
        | ArmoryError::DepthExceeded(_) => StatusCode::CONFLICT,
        ArmoryError::StorageError(_) | ArmoryError::SerializationError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ArmoryError> for ApiError {
    fn from(error: ArmoryError) -> Self {
        Self {
            status: status_for(&error),
            message: error.to_string(),
        }
    }
}

/// Malformed or mistyped bodies are client errors. Size and content-type
/// rejections keep their own status.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE => rejection.status(),
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        let status = if rejection.status().is_server_error() {
            rejection.status()
        } else {
            StatusCode::BAD_REQUEST
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// Numeric `{id}` path segment; a non-numeric id is a 400 with a JSON body.
#[derive(Debug, Clone, Copy)]
pub struct RowId(pub u64);

impl<S: Send + Sync> FromRequestParts<S> for RowId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<u64>::from_request_parts(parts, state).await?;
        Ok(Self(id))
    }
}
