//! Adapter that manages and stores tenants and the API keys bound to them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;
use uuid::Uuid;

use crate::prelude::*;

/// A tenant: a stable opaque identifier plus a unique human-readable name.
///
/// The name is the token proxy clients present in Basic credentials; the id is
/// only used by the admin plane.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
	pub tenant_id: Uuid,
	pub tenant_name: Box<str>,
}

/// An API key bound to exactly one tenant.
///
/// Rotation replaces the secret and bumps `updated_at` while preserving the id
/// and the tenant binding.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
	pub api_key_id: Uuid,
	pub api_key: Box<str>,
	pub tenant_id: Uuid,
	pub created_at: Option<Timestamp>,
	pub updated_at: Option<Timestamp>,
}

/// A Tollgate credential adapter
///
/// A `CredAdapter` is responsible for storing tenants and their API keys and
/// for answering the one question the dataplane asks: does this
/// `(tenant_name, api_key)` pair name a valid credential?
#[async_trait]
pub trait CredAdapter: Debug + Send + Sync {
	/// The verification primitive used by the proxy dataplane.
	///
	/// Must never surface a storage failure as anything other than `false`;
	/// the dataplane turns every negative into a 401.
	async fn verify_credentials(&self, tenant_name: &str, api_key: &str) -> TgResult<bool>;

	/// # Tenants
	async fn list_tenants(&self) -> TgResult<Vec<Tenant>>;
	async fn read_tenant(&self, tenant_id: Uuid) -> TgResult<Tenant>;
	async fn create_tenant(&self, tenant_name: &str) -> TgResult<Tenant>;
	async fn update_tenant(&self, tenant_id: Uuid, tenant_name: &str) -> TgResult<Tenant>;
	async fn delete_tenant(&self, tenant_id: Uuid) -> TgResult<()>;

	/// # API keys
	async fn list_api_keys(&self, tenant_id: Uuid) -> TgResult<Vec<ApiKey>>;
	async fn create_api_key(&self, tenant_id: Uuid) -> TgResult<ApiKey>;
	async fn rotate_api_key(&self, tenant_id: Uuid, api_key_id: Uuid) -> TgResult<ApiKey>;
	async fn delete_api_key(&self, tenant_id: Uuid, api_key_id: Uuid) -> TgResult<()>;
}

// vim: ts=4
