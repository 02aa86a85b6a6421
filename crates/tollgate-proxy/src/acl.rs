//! Per-tenant host ACLs: file-backed lists and the allow/deny decision.
//!
//! Each tenant has a JSON file `<acl_data_path>/<tenant_name>.json` with
//! `Whitelist` and `Blacklist` arrays of host[:port] patterns. The file is
//! re-read on every request so that changes pulled by the sync loop take
//! effect without a restart. A missing or malformed file yields empty lists,
//! which deny everything.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::pattern::PatternMatcher;
use crate::prelude::*;

/// A tenant's ACL. Blacklist wins over whitelist; no match denies.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AclList {
	#[serde(rename = "Whitelist", default)]
	pub whitelist: Vec<Box<str>>,
	#[serde(rename = "Blacklist", default)]
	pub blacklist: Vec<Box<str>>,
}

impl AclList {
	pub fn is_empty(&self) -> bool {
		self.whitelist.is_empty() && self.blacklist.is_empty()
	}
}

#[derive(Debug)]
pub struct AclStore {
	data_path: PathBuf,
	tenant_lists: Mutex<HashMap<Box<str>, Arc<AclList>>>,
	patterns: PatternMatcher,
}

impl AclStore {
	pub fn new(data_path: impl Into<PathBuf>) -> Self {
		Self {
			data_path: data_path.into(),
			tenant_lists: Mutex::new(HashMap::new()),
			patterns: PatternMatcher::new(),
		}
	}

	/// Load a tenant's ACL from disk. Read or parse errors yield the empty
	/// (deny-all) list and are logged at debug.
	pub async fn load(&self, tenant_name: &str) -> Arc<AclList> {
		let path = self.data_path.join(format!("{}.json", tenant_name));
		let list = match tokio::fs::read(&path).await {
			Ok(contents) => match serde_json::from_slice::<AclList>(&contents) {
				Ok(list) => {
					trace!("Loaded ACL list for tenant: {}", tenant_name);
					list
				}
				Err(err) => {
					debug!("Error parsing list file for tenant {}: {}", tenant_name, err);
					AclList::default()
				}
			},
			Err(err) => {
				debug!("Error reading list file for tenant {}: {}", tenant_name, err);
				AclList::default()
			}
		};
		let list = Arc::new(list);
		if let Ok(mut lists) = self.tenant_lists.lock() {
			lists.insert(tenant_name.into(), list.clone());
		}
		list
	}

	/// The ACL decision for one request: blacklist first, then whitelist,
	/// default deny.
	pub async fn is_request_allowed(&self, host_with_port: &str, tenant_name: &str) -> bool {
		let list = self.load(tenant_name).await;
		if list.is_empty() {
			trace!("No ACL rules defined for tenant {}, defaulting to block", tenant_name);
			return false;
		}

		let (host, port) = split_host_port(host_with_port);

		for b in &list.blacklist {
			if self.matches_pattern(host, port, b) {
				debug!("Request to {} blocked by blacklist rule: {}", host_with_port, b);
				return false;
			}
		}
		for w in &list.whitelist {
			if self.matches_pattern(host, port, w) {
				debug!("Request to {} allowed by whitelist rule: {}", host_with_port, w);
				return true;
			}
		}
		trace!("Request to {} matched no ACL rule, defaulting to block", host_with_port);
		false
	}

	/// A pattern may carry its own `:port`; the port gate passes when the
	/// pattern has none or it equals the request's. The host side goes
	/// through the compiled wildcard regex.
	fn matches_pattern(&self, host: &str, port: &str, pattern: &str) -> bool {
		let (pattern_host, pattern_port) = split_host_port(pattern);
		if pattern_port.is_empty() || pattern_port == port {
			return self.patterns.matches(host, pattern_host);
		}
		false
	}
}

/// Split `host[:port]`, understanding bracketed IPv6 literals. A bare IPv6
/// address without brackets is taken as all-host.
fn split_host_port(host_with_port: &str) -> (&str, &str) {
	if let Some(rest) = host_with_port.strip_prefix('[') {
		if let Some((host, port)) = rest.split_once(']') {
			return (host, port.strip_prefix(':').unwrap_or(""));
		}
		return (host_with_port, "");
	}
	match host_with_port.rsplit_once(':') {
		Some((host, port)) if !host.contains(':') => (host, port),
		_ => (host_with_port, ""),
	}
}


// vim: ts=4
