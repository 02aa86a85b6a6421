//! Admin control plane: tenant and API key management over HTTP.
//!
//! Everything except the landing page requires the static admin key in the
//! `X-Admin-API-Key` header. The dataplane never calls into this crate; it
//! only shares the credential adapter and the counters through `App`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod api_key;
pub mod status;
pub mod tenant;

mod prelude;

use axum::{
	Json, Router,
	extract::{Request, State},
	http::StatusCode,
	middleware::{self, Next},
	response::{Html, IntoResponse, Response},
	routing::{delete, get, post, put},
};

use crate::prelude::*;

const ADMIN_API_KEY_HEADER: &str = "X-Admin-API-Key";

/// Landing page, the one route that answers without credentials.
async fn admin_page() -> Html<&'static str> {
	Html(
		"<!DOCTYPE html>\n<html>\n<head><title>Tollgate</title></head>\n<body>\n\
		<h1>Tollgate forwarding proxy</h1>\n\
		<p>This is the administrative endpoint. Requests to the API require the\n\
		<code>X-Admin-API-Key</code> header.</p>\n\
		</body>\n</html>\n",
	)
}

/// Admin API key check for everything below `/`.
async fn require_admin(State(app): State<App>, req: Request, next: Next) -> Response {
	let presented = req
		.headers()
		.get(ADMIN_API_KEY_HEADER)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default();

	if presented.is_empty() || presented != app.config.admin.api_key.as_ref() {
		let body = serde_json::json!({
			"authenticated": false,
			"message": "Invalid API key",
		});
		return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
	}
	next.run(req).await
}

/// Build the admin router.
pub fn init(app: App) -> Router {
	let authenticated = Router::new()
		.route("/status", get(status::get_status))
		.route("/tenants", get(tenant::list_tenants))
		.route("/tenants", post(tenant::create_tenant))
		.route("/tenants/{tenant_id}", get(tenant::read_tenant))
		.route("/tenants/{tenant_id}", put(tenant::update_tenant))
		.route("/tenants/{tenant_id}", delete(tenant::delete_tenant))
		.route("/{tenant_id}/api-keys", get(api_key::list_api_keys))
		.route("/{tenant_id}/api-keys", post(api_key::create_api_key))
		.route("/{tenant_id}/api-keys/{api_key_id}/rotate", put(api_key::rotate_api_key))
		.route("/{tenant_id}/api-keys/{api_key_id}", delete(api_key::delete_api_key))
		.layer(middleware::from_fn_with_state(app.clone(), require_admin));

	Router::new()
		.route("/", get(admin_page))
		.merge(authenticated)
		.with_state(app)
}

// vim: ts=4
