//! SQLite-backed credential adapter: tenants and the API keys bound to them.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::{fmt::Debug, path::Path};
use uuid::Uuid;

use tollgate::cred_adapter::{ApiKey, CredAdapter, Tenant};
use tollgate::prelude::*;

mod api_key;
mod tenant;
mod utils;

use utils::inspect;

pub struct CredAdapterSqlite {
	db: SqlitePool,
}

impl Debug for CredAdapterSqlite {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CredAdapterSqlite").finish()
	}
}

impl CredAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> TgResult<Self> {
		if let Some(parent) = path.as_ref().parent() {
			std::fs::create_dir_all(parent)?;
		}

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db })
	}
}

#[async_trait]
impl CredAdapter for CredAdapterSqlite {
	async fn verify_credentials(&self, tenant_name: &str, api_key: &str) -> TgResult<bool> {
		api_key::verify_credentials(&self.db, tenant_name, api_key).await
	}

	async fn list_tenants(&self) -> TgResult<Vec<Tenant>> {
		tenant::list_tenants(&self.db).await
	}

	async fn read_tenant(&self, tenant_id: Uuid) -> TgResult<Tenant> {
		tenant::read_tenant(&self.db, tenant_id).await
	}

	async fn create_tenant(&self, tenant_name: &str) -> TgResult<Tenant> {
		tenant::create_tenant(&self.db, tenant_name).await
	}

	async fn update_tenant(&self, tenant_id: Uuid, tenant_name: &str) -> TgResult<Tenant> {
		tenant::update_tenant(&self.db, tenant_id, tenant_name).await
	}

	async fn delete_tenant(&self, tenant_id: Uuid) -> TgResult<()> {
		tenant::delete_tenant(&self.db, tenant_id).await
	}

	async fn list_api_keys(&self, tenant_id: Uuid) -> TgResult<Vec<ApiKey>> {
		api_key::list_api_keys(&self.db, tenant_id).await
	}

	async fn create_api_key(&self, tenant_id: Uuid) -> TgResult<ApiKey> {
		api_key::create_api_key(&self.db, tenant_id).await
	}

	async fn rotate_api_key(&self, tenant_id: Uuid, api_key_id: Uuid) -> TgResult<ApiKey> {
		api_key::rotate_api_key(&self.db, tenant_id, api_key_id).await
	}

	async fn delete_api_key(&self, tenant_id: Uuid, api_key_id: Uuid) -> TgResult<()> {
		api_key::delete_api_key(&self.db, tenant_id, api_key_id).await
	}
}

async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS tenants (
		tenant_id text NOT NULL,
		tenant_name text NOT NULL UNIQUE,
		PRIMARY KEY(tenant_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS api_keys (
		api_key_id text NOT NULL,
		api_key text NOT NULL,
		tenant_id text NOT NULL,
		created_at integer NOT NULL DEFAULT (unixepoch()),
		updated_at integer NOT NULL DEFAULT (unixepoch()),
		PRIMARY KEY(api_key_id),
		FOREIGN KEY (tenant_id) REFERENCES tenants(tenant_id) ON DELETE CASCADE,
		UNIQUE(api_key, tenant_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_api_keys_tenant ON api_keys (tenant_id)")
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
