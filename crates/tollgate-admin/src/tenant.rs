//! Admin tenant management handlers

use axum::{
	Json,
	extract::{Path, State},
	http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::prelude::*;
use tollgate_types::cred_adapter::Tenant;
use tollgate_types::types::ApiResponse;

/// Request body for creating or renaming a tenant
#[derive(Debug, Deserialize)]
pub struct TenantReq {
	pub name: String,
}

/// GET /tenants - List all tenants
pub async fn list_tenants(
	State(app): State<App>,
) -> TgResult<(StatusCode, Json<ApiResponse<Vec<Tenant>>>)> {
	let tenants = app.cred_adapter.list_tenants().await?;
	Ok((StatusCode::OK, Json(ApiResponse::new(tenants))))
}

/// GET /tenants/{tenant_id} - Read one tenant
pub async fn read_tenant(
	State(app): State<App>,
	Path(tenant_id): Path<Uuid>,
) -> TgResult<(StatusCode, Json<ApiResponse<Tenant>>)> {
	let tenant = app.cred_adapter.read_tenant(tenant_id).await?;
	Ok((StatusCode::OK, Json(ApiResponse::new(tenant))))
}

/// POST /tenants - Create a tenant
pub async fn create_tenant(
	State(app): State<App>,
	Json(req): Json<TenantReq>,
) -> TgResult<(StatusCode, Json<ApiResponse<Tenant>>)> {
	info!("Creating tenant {}", req.name);
	let tenant = app.cred_adapter.create_tenant(&req.name).await?;
	Ok((StatusCode::CREATED, Json(ApiResponse::new(tenant))))
}

/// PUT /tenants/{tenant_id} - Rename a tenant
pub async fn update_tenant(
	State(app): State<App>,
	Path(tenant_id): Path<Uuid>,
	Json(req): Json<TenantReq>,
) -> TgResult<(StatusCode, Json<ApiResponse<Tenant>>)> {
	info!("Renaming tenant {} to {}", tenant_id, req.name);
	let tenant = app.cred_adapter.update_tenant(tenant_id, &req.name).await?;
	Ok((StatusCode::OK, Json(ApiResponse::new(tenant))))
}

/// DELETE /tenants/{tenant_id} - Delete a tenant and its API keys
pub async fn delete_tenant(
	State(app): State<App>,
	Path(tenant_id): Path<Uuid>,
) -> TgResult<(StatusCode, Json<ApiResponse<()>>)> {
	info!("Deleting tenant {}", tenant_id);
	app.cred_adapter.delete_tenant(tenant_id).await?;
	Ok((StatusCode::OK, Json(ApiResponse::new(()))))
}

// vim: ts=4
