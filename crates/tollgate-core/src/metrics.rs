//! Counters and the observed-tenant set shared between the dataplane and the
//! admin plane.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// What the dataplane exposes to the outside: request counters and the set of
/// tenant names it has evaluated policy for since boot.
#[derive(Debug, Default)]
pub struct Metrics {
	pub requests_total: AtomicU64,
	pub requests_denied: AtomicU64,
	pub auth_failures: AtomicU64,
	pub tunnels_opened: AtomicU64,
	observed_tenants: Mutex<BTreeSet<Box<str>>>,
}

impl Metrics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record that policy was evaluated for a tenant.
	pub fn observe_tenant(&self, tenant_name: &str) {
		if let Ok(mut tenants) = self.observed_tenants.lock() {
			if !tenants.contains(tenant_name) {
				tenants.insert(tenant_name.into());
			}
		}
	}

	/// Snapshot of the tenants observed since boot, sorted by name.
	pub fn observed_tenants(&self) -> Vec<Box<str>> {
		match self.observed_tenants.lock() {
			Ok(tenants) => tenants.iter().cloned().collect(),
			Err(_) => Vec::new(),
		}
	}

	pub fn requests_total(&self) -> u64 {
		self.requests_total.load(Ordering::Relaxed)
	}

	pub fn requests_denied(&self) -> u64 {
		self.requests_denied.load(Ordering::Relaxed)
	}

	pub fn auth_failures(&self) -> u64 {
		self.auth_failures.load(Ordering::Relaxed)
	}

	pub fn tunnels_opened(&self) -> u64 {
		self.tunnels_opened.load(Ordering::Relaxed)
	}
}


// vim: ts=4
