//! Proxy client authentication: `Proxy-Authorization: Basic` parsing and the
//! short-TTL cache of positive verifications.
//!
//! The decoded credential is `tenant_name:api_key`. Positive verdicts are
//! cached for five minutes under the key `tenant_name + ":" + api_key` (both
//! tokens are already constrained by the Basic format, so the bare `:` join
//! is unambiguous enough). Negative verdicts are never cached. The
//! authenticated tenant name is returned to the caller and travels with the
//! request from there on.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hyper::header::{HeaderMap, PROXY_AUTHORIZATION};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tollgate_types::cred_adapter::CredAdapter;

use crate::prelude::*;

const AUTH_CACHE_TTL_SECS: i64 = 5 * 60;

/// Bounds memory; entries are tiny, so this comfortably covers any realistic
/// live credential population.
const AUTH_CACHE_CAPACITY: usize = 10_000;

/// The ways a request can fail authentication, each with the response body
/// the client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
	MissingHeader,
	InvalidFormat,
	InvalidBase64,
	MissingColon,
	InvalidCredentials,
}

impl AuthFailure {
	pub fn message(self) -> &'static str {
		match self {
			AuthFailure::MissingHeader => "Unauthorized: Authorization header required",
			AuthFailure::InvalidFormat => "Unauthorized: Invalid Authorization format",
			AuthFailure::InvalidBase64 => "Unauthorized: Invalid Base64 encoding",
			AuthFailure::MissingColon => "Unauthorized: tenant_name and api_key required",
			AuthFailure::InvalidCredentials => "Unauthorized: Invalid tenant_name or api_key",
		}
	}
}

#[derive(Debug, Clone)]
struct AuthCacheEntry {
	tenant_name: Box<str>,
	expires_at: Timestamp,
}

/// Positive-only credential cache.
pub struct AuthCache {
	entries: parking_lot::RwLock<LruCache<String, AuthCacheEntry>>,
}

impl Default for AuthCache {
	fn default() -> Self {
		Self::new()
	}
}

impl AuthCache {
	pub fn new() -> Self {
		let capacity = NonZeroUsize::new(AUTH_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
		Self { entries: parking_lot::RwLock::new(LruCache::new(capacity)) }
	}

	fn cache_key(tenant_name: &str, api_key: &str) -> String {
		format!("{}:{}", tenant_name, api_key)
	}

	/// Look up a credential; a hit that has not expired authenticates the
	/// request. Expired entries are ignored and overwritten by the next
	/// successful verification.
	pub fn check(&self, tenant_name: &str, api_key: &str) -> Option<Box<str>> {
		self.check_at(tenant_name, api_key, Timestamp::now())
	}

	fn check_at(&self, tenant_name: &str, api_key: &str, now: Timestamp) -> Option<Box<str>> {
		let key = Self::cache_key(tenant_name, api_key);
		let mut entries = self.entries.write();
		if let Some(entry) = entries.get(&key) {
			if entry.expires_at > now {
				return Some(entry.tenant_name.clone());
			}
		}
		None
	}

	/// Record a successful verification. Last writer wins under races; both
	/// writers carry the same positive verdict.
	pub fn update(&self, tenant_name: &str, api_key: &str) {
		self.update_at(tenant_name, api_key, Timestamp::now());
	}

	fn update_at(&self, tenant_name: &str, api_key: &str, now: Timestamp) {
		let key = Self::cache_key(tenant_name, api_key);
		let entry = AuthCacheEntry {
			tenant_name: tenant_name.into(),
			expires_at: now.add_seconds(AUTH_CACHE_TTL_SECS),
		};
		self.entries.write().put(key, entry);
	}
}

/// Parse `Proxy-Authorization: Basic <base64>` into `(tenant_name, api_key)`.
///
/// The scheme token is matched exactly as `Basic`; the decoded payload splits
/// on the first `:`.
fn parse_credentials(headers: &HeaderMap) -> Result<(String, String), AuthFailure> {
	let auth = headers.get(PROXY_AUTHORIZATION).ok_or(AuthFailure::MissingHeader)?;
	let auth = auth.to_str().map_err(|_| AuthFailure::InvalidFormat)?;

	let (scheme, payload) = auth.split_once(' ').ok_or(AuthFailure::InvalidFormat)?;
	if scheme != "Basic" {
		return Err(AuthFailure::InvalidFormat);
	}

	let decoded = BASE64.decode(payload).map_err(|_| AuthFailure::InvalidBase64)?;
	let decoded = String::from_utf8(decoded).map_err(|_| AuthFailure::InvalidBase64)?;

	let (tenant_name, api_key) = decoded.split_once(':').ok_or(AuthFailure::MissingColon)?;
	Ok((tenant_name.to_string(), api_key.to_string()))
}

/// Authenticate one request and return its tenant name.
///
/// Cache hit short-circuits the credential store; a miss verifies against the
/// store and caches only success.
pub async fn authenticate(
	cache: &AuthCache,
	cred_adapter: &Arc<dyn CredAdapter>,
	headers: &HeaderMap,
) -> Result<Box<str>, AuthFailure> {
	let (tenant_name, api_key) = parse_credentials(headers)?;

	if let Some(cached_tenant) = cache.check(&tenant_name, &api_key) {
		return Ok(cached_tenant);
	}

	match cred_adapter.verify_credentials(&tenant_name, &api_key).await {
		Ok(true) => {
			cache.update(&tenant_name, &api_key);
			Ok(tenant_name.into())
		}
		Ok(false) => Err(AuthFailure::InvalidCredentials),
		Err(err) => {
			debug!("Credential store error for tenant {}: {}", tenant_name, err);
			Err(AuthFailure::InvalidCredentials)
		}
	}
}


// vim: ts=4
