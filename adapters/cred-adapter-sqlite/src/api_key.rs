//! API key management operations

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::utils::*;
use tollgate::{
	cred_adapter::ApiKey,
	prelude::*,
	utils::{API_KEY_LENGTH, random_token},
};

fn api_key_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApiKey, sqlx::Error> {
	Ok(ApiKey {
		api_key_id: parse_uuid(row.try_get("api_key_id")?)?,
		api_key: row.try_get("api_key")?,
		tenant_id: parse_uuid(row.try_get("tenant_id")?)?,
		created_at: Some(Timestamp(row.try_get::<i64, _>("created_at")?)),
		updated_at: Some(Timestamp(row.try_get::<i64, _>("updated_at")?)),
	})
}

/// The verification primitive behind the proxy's 401 decision: does this
/// tenant/key pair exist?
pub(crate) async fn verify_credentials(
	db: &SqlitePool,
	tenant_name: &str,
	api_key: &str,
) -> TgResult<bool> {
	let row = sqlx::query(
		"SELECT tenants.tenant_name
			FROM api_keys
			JOIN tenants ON api_keys.tenant_id = tenants.tenant_id
			WHERE api_keys.api_key = ?1 AND tenants.tenant_name = ?2",
	)
	.bind(api_key)
	.bind(tenant_name)
	.fetch_optional(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	Ok(row.is_some())
}

pub(crate) async fn list_api_keys(db: &SqlitePool, tenant_id: Uuid) -> TgResult<Vec<ApiKey>> {
	let rows = sqlx::query(
		"SELECT api_key_id, api_key, tenant_id, created_at, updated_at
			FROM api_keys
			WHERE tenant_id = ?1
			ORDER BY created_at",
	)
	.bind(tenant_id.to_string())
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	rows.iter()
		.map(|row| api_key_from_row(row).inspect_err(inspect).map_err(|_| Error::DbError))
		.collect()
}

pub(crate) async fn create_api_key(db: &SqlitePool, tenant_id: Uuid) -> TgResult<ApiKey> {
	// The tenant must exist; the insert alone would not tell us
	crate::tenant::read_tenant(db, tenant_id).await?;

	let api_key_id = Uuid::new_v4();
	let secret = random_token(API_KEY_LENGTH)?;

	let res = sqlx::query(
		"INSERT INTO api_keys (api_key_id, api_key, tenant_id) VALUES (?1, ?2, ?3)
			RETURNING api_key_id, api_key, tenant_id, created_at, updated_at",
	)
	.bind(api_key_id.to_string())
	.bind(&secret)
	.bind(tenant_id.to_string())
	.fetch_one(db)
	.await;

	let key = map_res(res, |row| api_key_from_row(&row))?;
	info!("API key {} created for tenant {}", key.api_key_id, tenant_id);
	Ok(key)
}

/// Replace the secret in place: same id, same tenant binding, fresh
/// `updated_at`.
pub(crate) async fn rotate_api_key(
	db: &SqlitePool,
	tenant_id: Uuid,
	api_key_id: Uuid,
) -> TgResult<ApiKey> {
	let secret = random_token(API_KEY_LENGTH)?;

	let res = sqlx::query(
		"UPDATE api_keys SET api_key = ?3, updated_at = unixepoch()
			WHERE api_key_id = ?1 AND tenant_id = ?2
			RETURNING api_key_id, api_key, tenant_id, created_at, updated_at",
	)
	.bind(api_key_id.to_string())
	.bind(tenant_id.to_string())
	.bind(&secret)
	.fetch_one(db)
	.await;

	let key = map_res(res, |row| api_key_from_row(&row))?;
	info!("API key {} rotated for tenant {}", api_key_id, tenant_id);
	Ok(key)
}

pub(crate) async fn delete_api_key(
	db: &SqlitePool,
	tenant_id: Uuid,
	api_key_id: Uuid,
) -> TgResult<()> {
	let res = sqlx::query("DELETE FROM api_keys WHERE api_key_id = ?1 AND tenant_id = ?2")
		.bind(api_key_id.to_string())
		.bind(tenant_id.to_string())
		.execute(db)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}

	info!("API key {} deleted for tenant {}", api_key_id, tenant_id);
	Ok(())
}

// vim: ts=4
