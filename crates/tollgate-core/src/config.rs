//! Configuration loading.
//!
//! Options come from an optional `config.json` in the working directory (or
//! the path named by `TOLLGATE_CONFIG`), with environment variables taking
//! precedence. Every option maps to an env var by upcasing its path and
//! replacing `.` and `-` with `_`, so `proxy.max-concurrent` is overridden by
//! `PROXY_MAX_CONCURRENT`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::prelude::*;

const DEFAULT_PROXY_ADDR: &str = ":8080";
const DEFAULT_MAX_CONCURRENT: usize = 512;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_CONNS_PER_IP: usize = 1000;
const DEFAULT_MAX_REQUESTS_PER_CONN: usize = 1000;
const DEFAULT_ADMIN_ADDR: &str = ":9090";
const DEFAULT_ACL_DATA_PATH: &str = "/opt/tollgate/acl/tenants";
const DEFAULT_DB_FILE_PATH: &str = "/opt/tollgate/data.db";
const DEFAULT_GIT_BRANCH: &str = "main";
const DEFAULT_GIT_REPO_PATH: &str = "/opt/tollgate/acl";
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Proxy dataplane options
#[derive(Clone, Debug)]
pub struct ProxyConfig {
	pub addr: SocketAddr,
	pub max_concurrent: usize,
	pub timeout: Duration,
	pub max_conns_per_ip: usize,
	pub max_requests_per_conn: usize,
	/// Resolver addresses handed to deployments that pin DNS. Informational.
	pub dns: Vec<Box<str>>,
}

/// Admin control plane options
#[derive(Clone, Debug)]
pub struct AdminConfig {
	pub addr: SocketAddr,
	/// Empty means: generate one at boot and log it once.
	pub api_key: Box<str>,
}

/// Credential store options
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
	pub file_path: PathBuf,
}

/// ACL git synchronization options. Sync runs only if `repo_url` is set.
#[derive(Clone, Debug)]
pub struct GitSyncConfig {
	pub repo_url: Option<Box<str>>,
	pub branch_name: Box<str>,
	pub username: Box<str>,
	pub password: Box<str>,
	pub repo_path: PathBuf,
	pub sync_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
	pub proxy: ProxyConfig,
	pub admin: AdminConfig,
	pub database: DatabaseConfig,
	pub git_acl: GitSyncConfig,
	pub acl_data_path: PathBuf,
	pub log_level: Box<str>,
}

// Raw (file-shaped) configuration. Everything optional; `resolve` applies the
// defaults above.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawConfig {
	proxy: RawProxy,
	admin: RawAdmin,
	database: RawDatabase,
	git_acl: RawGitAcl,
	acl_data_path: Option<String>,
	log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawProxy {
	addr: Option<String>,
	max_concurrent: Option<usize>,
	timeout: Option<String>,
	max_conns_per_ip: Option<usize>,
	max_requests_per_conn: Option<usize>,
	dns: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawAdmin {
	addr: Option<String>,
	api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawDatabase {
	file_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct RawGitAcl {
	repo_url: Option<String>,
	branch_name: Option<String>,
	username: Option<String>,
	password: Option<String>,
	repo_path: Option<String>,
	sync_interval: Option<String>,
}

impl Config {
	/// Load the configuration: file (if present) plus environment overrides.
	///
	/// A missing or unparsable file is not fatal; invalid resolved values
	/// (a listen address that does not parse) are.
	pub fn load() -> TgResult<Config> {
		let path =
			std::env::var("TOLLGATE_CONFIG").unwrap_or_else(|_| "config.json".to_string());
		let mut raw = match std::fs::read_to_string(&path) {
			Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
				Ok(raw) => raw,
				Err(err) => {
					warn!("Error parsing config file {}, using defaults: {}", path, err);
					RawConfig::default()
				}
			},
			Err(err) => {
				warn!("Error reading config file {}, using defaults: {}", path, err);
				RawConfig::default()
			}
		};
		apply_env(&mut raw, |key| std::env::var(key).ok().filter(|v| !v.is_empty()));
		raw.resolve()
	}
}

/// Overlay environment variables onto the raw configuration.
fn apply_env(raw: &mut RawConfig, get: impl Fn(&str) -> Option<String>) {
	if let Some(v) = get("PROXY_ADDR") {
		raw.proxy.addr = Some(v);
	}
	if let Some(v) = get("PROXY_MAX_CONCURRENT") {
		raw.proxy.max_concurrent = v.parse().ok();
	}
	if let Some(v) = get("PROXY_TIMEOUT") {
		raw.proxy.timeout = Some(v);
	}
	if let Some(v) = get("PROXY_MAX_CONNS_PER_IP") {
		raw.proxy.max_conns_per_ip = v.parse().ok();
	}
	if let Some(v) = get("PROXY_MAX_REQUESTS_PER_CONN") {
		raw.proxy.max_requests_per_conn = v.parse().ok();
	}
	if let Some(v) = get("PROXY_DNS") {
		raw.proxy.dns = Some(v.split(',').map(str::to_string).collect());
	}
	if let Some(v) = get("ADMIN_ADDR") {
		raw.admin.addr = Some(v);
	}
	if let Some(v) = get("ADMIN_API_KEY") {
		raw.admin.api_key = Some(v);
	}
	if let Some(v) = get("DATABASE_FILE_PATH") {
		raw.database.file_path = Some(v);
	}
	if let Some(v) = get("ACL_DATA_PATH") {
		raw.acl_data_path = Some(v);
	}
	if let Some(v) = get("LOG_LEVEL") {
		raw.log_level = Some(v);
	}
	if let Some(v) = get("GIT_ACL_REPO_URL") {
		raw.git_acl.repo_url = Some(v);
	}
	if let Some(v) = get("GIT_ACL_BRANCH_NAME") {
		raw.git_acl.branch_name = Some(v);
	}
	if let Some(v) = get("GIT_ACL_USERNAME") {
		raw.git_acl.username = Some(v);
	}
	if let Some(v) = get("GIT_ACL_PASSWORD") {
		raw.git_acl.password = Some(v);
	}
	if let Some(v) = get("GIT_ACL_REPO_PATH") {
		raw.git_acl.repo_path = Some(v);
	}
	if let Some(v) = get("GIT_ACL_SYNC_INTERVAL") {
		raw.git_acl.sync_interval = Some(v);
	}
}

impl RawConfig {
	fn resolve(self) -> TgResult<Config> {
		Ok(Config {
			proxy: ProxyConfig {
				addr: parse_addr(self.proxy.addr.as_deref().unwrap_or(DEFAULT_PROXY_ADDR))?,
				max_concurrent: self.proxy.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
				timeout: self
					.proxy
					.timeout
					.as_deref()
					.map(parse_duration)
					.transpose()?
					.unwrap_or(DEFAULT_TIMEOUT),
				max_conns_per_ip: self
					.proxy
					.max_conns_per_ip
					.unwrap_or(DEFAULT_MAX_CONNS_PER_IP),
				max_requests_per_conn: self
					.proxy
					.max_requests_per_conn
					.unwrap_or(DEFAULT_MAX_REQUESTS_PER_CONN),
				dns: self
					.proxy
					.dns
					.unwrap_or_default()
					.into_iter()
					.map(Into::into)
					.collect(),
			},
			admin: AdminConfig {
				addr: parse_addr(self.admin.addr.as_deref().unwrap_or(DEFAULT_ADMIN_ADDR))?,
				api_key: self.admin.api_key.unwrap_or_default().into(),
			},
			database: DatabaseConfig {
				file_path: self
					.database
					.file_path
					.unwrap_or_else(|| DEFAULT_DB_FILE_PATH.to_string())
					.into(),
			},
			git_acl: GitSyncConfig {
				repo_url: self.git_acl.repo_url.filter(|u| !u.is_empty()).map(Into::into),
				branch_name: self
					.git_acl
					.branch_name
					.unwrap_or_else(|| DEFAULT_GIT_BRANCH.to_string())
					.into(),
				username: self.git_acl.username.unwrap_or_default().into(),
				password: self.git_acl.password.unwrap_or_default().into(),
				repo_path: self
					.git_acl
					.repo_path
					.unwrap_or_else(|| DEFAULT_GIT_REPO_PATH.to_string())
					.into(),
				sync_interval: self
					.git_acl
					.sync_interval
					.as_deref()
					.map(parse_duration)
					.transpose()?
					.unwrap_or(DEFAULT_SYNC_INTERVAL),
			},
			acl_data_path: self
				.acl_data_path
				.unwrap_or_else(|| DEFAULT_ACL_DATA_PATH.to_string())
				.into(),
			log_level: self.log_level.unwrap_or_else(|| "info".to_string()).into(),
		})
	}
}

/// Parse a listen address; a bare `:port` listens on all interfaces.
fn parse_addr(addr: &str) -> TgResult<SocketAddr> {
	let normalized = if addr.starts_with(':') {
		format!("0.0.0.0{}", addr)
	} else {
		addr.to_string()
	};
	normalized
		.parse()
		.map_err(|_| Error::ConfigError(format!("invalid listen address: {}", addr)))
}

/// Parse a duration: humantime syntax (`20s`, `1m`) or bare seconds (`60`).
fn parse_duration(value: &str) -> TgResult<Duration> {
	if value.chars().all(|c| c.is_ascii_digit()) {
		let secs: u64 = value
			.parse()
			.map_err(|_| Error::ConfigError(format!("invalid duration: {}", value)))?;
		return Ok(Duration::from_secs(secs));
	}
	humantime::parse_duration(value)
		.map_err(|_| Error::ConfigError(format!("invalid duration: {}", value)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = RawConfig::default().resolve().unwrap();
		assert_eq!(config.proxy.addr.port(), 8080);
		assert_eq!(config.proxy.max_concurrent, 512);
		assert_eq!(config.proxy.timeout, Duration::from_secs(20));
		assert_eq!(config.proxy.max_conns_per_ip, 1000);
		assert_eq!(config.admin.addr.port(), 9090);
		assert!(config.git_acl.repo_url.is_none());
		assert_eq!(config.git_acl.sync_interval, Duration::from_secs(60));
		assert_eq!(config.log_level.as_ref(), "info");
	}

	#[test]
	fn test_file_values() {
		let raw: RawConfig = serde_json::from_str(
			r#"{
				"proxy": { "addr": "127.0.0.1:3128", "max-concurrent": 64, "timeout": "5s" },
				"admin": { "addr": ":9999", "api-key": "sekrit" },
				"git-acl": { "repo-url": "https://git.example.com/acl.git", "sync-interval": "30s" },
				"acl-data-path": "/tmp/acl",
				"log-level": "debug"
			}"#,
		)
		.unwrap();
		let config = raw.resolve().unwrap();
		assert_eq!(config.proxy.addr.to_string(), "127.0.0.1:3128");
		assert_eq!(config.proxy.max_concurrent, 64);
		assert_eq!(config.proxy.timeout, Duration::from_secs(5));
		assert_eq!(config.admin.api_key.as_ref(), "sekrit");
		assert_eq!(
			config.git_acl.repo_url.as_deref(),
			Some("https://git.example.com/acl.git")
		);
		assert_eq!(config.git_acl.sync_interval, Duration::from_secs(30));
		assert_eq!(config.acl_data_path.to_str(), Some("/tmp/acl"));
	}

	#[test]
	fn test_env_overrides_beat_file_values() {
		let mut raw: RawConfig =
			serde_json::from_str(r#"{ "proxy": { "max-concurrent": 64, "timeout": "5s" } }"#)
				.unwrap();
		let env = |key: &str| match key {
			"PROXY_MAX_CONCURRENT" => Some("128".to_string()),
			"PROXY_TIMEOUT" => Some("1m".to_string()),
			"GIT_ACL_REPO_URL" => Some("https://git.example.com/acl.git".to_string()),
			_ => None,
		};
		apply_env(&mut raw, env);
		let config = raw.resolve().unwrap();
		assert_eq!(config.proxy.max_concurrent, 128);
		assert_eq!(config.proxy.timeout, Duration::from_secs(60));
		assert!(config.git_acl.repo_url.is_some());
	}

	#[test]
	fn test_invalid_addr_is_fatal() {
		let raw: RawConfig =
			serde_json::from_str(r#"{ "proxy": { "addr": "not an address" } }"#).unwrap();
		assert!(matches!(raw.resolve(), Err(Error::ConfigError(_))));
	}

	#[test]
	fn test_duration_formats() {
		assert_eq!(parse_duration("20s").unwrap(), Duration::from_secs(20));
		assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
		assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
		assert!(parse_duration("soon").is_err());
	}
}

// vim: ts=4
