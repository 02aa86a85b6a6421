//! Admin API key management handlers

use axum::{
	Json,
	extract::{Path, State},
	http::StatusCode,
};
use uuid::Uuid;

use crate::prelude::*;
use tollgate_types::cred_adapter::ApiKey;
use tollgate_types::types::ApiResponse;

/// GET /{tenant_id}/api-keys - List the tenant's keys
pub async fn list_api_keys(
	State(app): State<App>,
	Path(tenant_id): Path<Uuid>,
) -> TgResult<(StatusCode, Json<ApiResponse<Vec<ApiKey>>>)> {
	let keys = app.cred_adapter.list_api_keys(tenant_id).await?;
	Ok((StatusCode::OK, Json(ApiResponse::new(keys))))
}

/// POST /{tenant_id}/api-keys - Mint a new key for the tenant
pub async fn create_api_key(
	State(app): State<App>,
	Path(tenant_id): Path<Uuid>,
) -> TgResult<(StatusCode, Json<ApiResponse<ApiKey>>)> {
	let key = app.cred_adapter.create_api_key(tenant_id).await?;
	info!("Created API key {} for tenant {}", key.api_key_id, tenant_id);
	Ok((StatusCode::CREATED, Json(ApiResponse::new(key))))
}

/// PUT /{tenant_id}/api-keys/{api_key_id}/rotate - Replace the secret
pub async fn rotate_api_key(
	State(app): State<App>,
	Path((tenant_id, api_key_id)): Path<(Uuid, Uuid)>,
) -> TgResult<(StatusCode, Json<ApiResponse<ApiKey>>)> {
	let key = app.cred_adapter.rotate_api_key(tenant_id, api_key_id).await?;
	info!("Rotated API key {} for tenant {}", api_key_id, tenant_id);
	Ok((StatusCode::OK, Json(ApiResponse::new(key))))
}

/// DELETE /{tenant_id}/api-keys/{api_key_id} - Delete a key
pub async fn delete_api_key(
	State(app): State<App>,
	Path((tenant_id, api_key_id)): Path<(Uuid, Uuid)>,
) -> TgResult<(StatusCode, Json<ApiResponse<()>>)> {
	app.cred_adapter.delete_api_key(tenant_id, api_key_id).await?;
	info!("Deleted API key {} for tenant {}", api_key_id, tenant_id);
	Ok((StatusCode::OK, Json(ApiResponse::new(()))))
}

// vim: ts=4
