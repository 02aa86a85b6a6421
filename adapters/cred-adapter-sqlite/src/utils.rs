//! Row mapping helpers shared by the adapter modules.

use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use tollgate::prelude::*;

pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> TgResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

/// Uuids are stored as their canonical text form.
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, sqlx::Error> {
	Uuid::parse_str(value).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

// vim: ts=4
