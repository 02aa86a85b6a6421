//! Tenant management operations

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::utils::*;
use tollgate::{cred_adapter::Tenant, prelude::*};

fn tenant_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, sqlx::Error> {
	Ok(Tenant {
		tenant_id: parse_uuid(row.try_get("tenant_id")?)?,
		tenant_name: row.try_get("tenant_name")?,
	})
}

pub(crate) async fn list_tenants(db: &SqlitePool) -> TgResult<Vec<Tenant>> {
	let rows = sqlx::query("SELECT tenant_id, tenant_name FROM tenants ORDER BY tenant_name")
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	rows.iter()
		.map(|row| tenant_from_row(row).inspect_err(inspect).map_err(|_| Error::DbError))
		.collect()
}

pub(crate) async fn read_tenant(db: &SqlitePool, tenant_id: Uuid) -> TgResult<Tenant> {
	let res = sqlx::query("SELECT tenant_id, tenant_name FROM tenants WHERE tenant_id = ?1")
		.bind(tenant_id.to_string())
		.fetch_one(db)
		.await;

	map_res(res, |row| tenant_from_row(&row))
}

pub(crate) async fn create_tenant(db: &SqlitePool, tenant_name: &str) -> TgResult<Tenant> {
	if tenant_name.is_empty() || tenant_name.contains(':') {
		return Err(Error::ValidationError(
			"tenant name must be non-empty and must not contain ':'".into(),
		));
	}

	let tenant_id = Uuid::new_v4();
	sqlx::query("INSERT INTO tenants (tenant_id, tenant_name) VALUES (?1, ?2)")
		.bind(tenant_id.to_string())
		.bind(tenant_name)
		.execute(db)
		.await
		.map_err(|err| {
			if err.as_database_error().map(|e| e.is_unique_violation()).unwrap_or(false) {
				Error::Conflict("tenant name already exists".into())
			} else {
				inspect(&err);
				Error::DbError
			}
		})?;

	info!("Tenant created: {} ({})", tenant_name, tenant_id);
	Ok(Tenant { tenant_id, tenant_name: tenant_name.into() })
}

pub(crate) async fn update_tenant(
	db: &SqlitePool,
	tenant_id: Uuid,
	tenant_name: &str,
) -> TgResult<Tenant> {
	if tenant_name.is_empty() || tenant_name.contains(':') {
		return Err(Error::ValidationError(
			"tenant name must be non-empty and must not contain ':'".into(),
		));
	}

	let res = sqlx::query("UPDATE tenants SET tenant_name = ?2 WHERE tenant_id = ?1")
		.bind(tenant_id.to_string())
		.bind(tenant_name)
		.execute(db)
		.await
		.map_err(|err| {
			if err.as_database_error().map(|e| e.is_unique_violation()).unwrap_or(false) {
				Error::Conflict("tenant name already exists".into())
			} else {
				inspect(&err);
				Error::DbError
			}
		})?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(Tenant { tenant_id, tenant_name: tenant_name.into() })
}

pub(crate) async fn delete_tenant(db: &SqlitePool, tenant_id: Uuid) -> TgResult<()> {
	let mut tx = db.begin().await.inspect_err(inspect).or(Err(Error::DbError))?;

	// SQLite only enforces the cascade with foreign keys on, so delete
	// dependents explicitly
	sqlx::query("DELETE FROM api_keys WHERE tenant_id = ?1")
		.bind(tenant_id.to_string())
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	let res = sqlx::query("DELETE FROM tenants WHERE tenant_id = ?1")
		.bind(tenant_id.to_string())
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}

	tx.commit().await.inspect_err(inspect).or(Err(Error::DbError))?;

	info!("Tenant deleted: {}", tenant_id);
	Ok(())
}

// vim: ts=4
