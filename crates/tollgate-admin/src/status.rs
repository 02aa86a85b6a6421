//! Admin status handler: what the dataplane exposes to operators.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::prelude::*;
use tollgate_types::types::ApiResponse;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
	pub version: &'static str,
	pub observed_tenants: Vec<Box<str>>,
	pub requests_total: u64,
	pub requests_denied: u64,
	pub auth_failures: u64,
	pub tunnels_opened: u64,
}

/// GET /status - Observed tenants and request counters
pub async fn get_status(
	State(app): State<App>,
) -> TgResult<(StatusCode, Json<ApiResponse<StatusView>>)> {
	let status = StatusView {
		version: tollgate_core::app::VERSION,
		observed_tenants: app.metrics.observed_tenants(),
		requests_total: app.metrics.requests_total(),
		requests_denied: app.metrics.requests_denied(),
		auth_failures: app.metrics.auth_failures(),
		tunnels_opened: app.metrics.tunnels_opened(),
	};
	Ok((StatusCode::OK, Json(ApiResponse::new(status))))
}

// vim: ts=4
