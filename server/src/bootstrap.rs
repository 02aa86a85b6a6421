//! Boot-time initialization: the ACL data directory and the default tenant.

use tollgate_core::app::App;
use tollgate_types::prelude::*;

const DEFAULT_TENANT: &str = "default";

/// Ensure the ACL data directory, a starter ACL file and the default tenant
/// exist. Everything here is idempotent.
pub async fn init(app: &App) -> TgResult<()> {
	tokio::fs::create_dir_all(&app.config.acl_data_path).await?;

	let default_list_path = app.config.acl_data_path.join("default.json");
	if !tokio::fs::try_exists(&default_list_path).await.unwrap_or(false) {
		let default_list = serde_json::json!({
			"Whitelist": ["*.example.com"],
			"Blacklist": ["restricted.example.com"],
		});
		tokio::fs::write(&default_list_path, serde_json::to_vec_pretty(&default_list)?).await?;
		info!("Default tenant ACL file created");
	}

	let tenants = app.cred_adapter.list_tenants().await?;
	if tenants.iter().any(|tenant| tenant.tenant_name.as_ref() == DEFAULT_TENANT) {
		info!("Default tenant already exists");
	} else {
		let tenant = app.cred_adapter.create_tenant(DEFAULT_TENANT).await?;
		info!("Default tenant created: {}", tenant.tenant_id);
	}

	Ok(())
}

// vim: ts=4
