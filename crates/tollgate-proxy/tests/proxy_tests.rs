//! End-to-end tests for the proxy dispatcher: authentication, policy,
//! forwarding and CONNECT tunneling against local upstreams.
#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use tollgate_core::app::AppState;
use tollgate_core::config::{
	AdminConfig, Config, DatabaseConfig, GitSyncConfig, ProxyConfig,
};
use tollgate_proxy::ProxyServer;
use tollgate_types::cred_adapter::{ApiKey, CredAdapter, Tenant};
use tollgate_types::prelude::*;

const TENANT: &str = "acme";
const API_KEY: &str = "sekrit-api-key";

#[derive(Debug)]
struct StaticCredAdapter;

#[async_trait]
impl CredAdapter for StaticCredAdapter {
	async fn verify_credentials(&self, tenant_name: &str, api_key: &str) -> TgResult<bool> {
		Ok(tenant_name == TENANT && api_key == API_KEY)
	}

	async fn list_tenants(&self) -> TgResult<Vec<Tenant>> {
		Ok(vec![])
	}
	async fn read_tenant(&self, _tenant_id: Uuid) -> TgResult<Tenant> {
		Err(Error::NotFound)
	}
	async fn create_tenant(&self, _tenant_name: &str) -> TgResult<Tenant> {
		Err(Error::NotFound)
	}
	async fn update_tenant(&self, _tenant_id: Uuid, _tenant_name: &str) -> TgResult<Tenant> {
		Err(Error::NotFound)
	}
	async fn delete_tenant(&self, _tenant_id: Uuid) -> TgResult<()> {
		Err(Error::NotFound)
	}
	async fn list_api_keys(&self, _tenant_id: Uuid) -> TgResult<Vec<ApiKey>> {
		Ok(vec![])
	}
	async fn create_api_key(&self, _tenant_id: Uuid) -> TgResult<ApiKey> {
		Err(Error::NotFound)
	}
	async fn rotate_api_key(&self, _tenant_id: Uuid, _api_key_id: Uuid) -> TgResult<ApiKey> {
		Err(Error::NotFound)
	}
	async fn delete_api_key(&self, _tenant_id: Uuid, _api_key_id: Uuid) -> TgResult<()> {
		Err(Error::NotFound)
	}
}

fn test_config(acl_data_path: &Path) -> Config {
	Config {
		proxy: ProxyConfig {
			addr: "127.0.0.1:0".parse().unwrap(),
			max_concurrent: 32,
			timeout: Duration::from_secs(5),
			max_conns_per_ip: 100,
			max_requests_per_conn: 100,
			dns: vec![],
		},
		admin: AdminConfig { addr: "127.0.0.1:0".parse().unwrap(), api_key: "admin".into() },
		database: DatabaseConfig { file_path: "/tmp/unused.db".into() },
		git_acl: GitSyncConfig {
			repo_url: None,
			branch_name: "main".into(),
			username: "".into(),
			password: "".into(),
			repo_path: "/tmp/unused".into(),
			sync_interval: Duration::from_secs(60),
		},
		acl_data_path: acl_data_path.to_path_buf(),
		log_level: "info".into(),
	}
}

async fn start_proxy(acl_dir: &Path) -> (ProxyServer, SocketAddr) {
	let config = test_config(acl_dir);
	let app = AppState::new(config, Arc::new(StaticCredAdapter));
	let server = ProxyServer::new(app);
	let addr = server.start().await.expect("proxy failed to start");
	(server, addr)
}

fn proxy_auth_header() -> String {
	format!("Basic {}", BASE64.encode(format!("{}:{}", TENANT, API_KEY)))
}

/// Read one HTTP response (headers plus Content-Length body) off a stream.
async fn read_response(stream: &mut TcpStream) -> (u16, String) {
	let mut buf = Vec::new();
	let mut chunk = [0u8; 4096];
	let header_end = loop {
		let n = stream.read(&mut chunk).await.expect("read failed");
		assert!(n > 0, "connection closed before response head");
		buf.extend_from_slice(&chunk[..n]);
		if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
			break pos + 4;
		}
	};

	let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
	let status: u16 = head
		.split_whitespace()
		.nth(1)
		.and_then(|s| s.parse().ok())
		.expect("bad status line");

	let content_length: usize = head
		.lines()
		.find_map(|line| {
			let (name, value) = line.split_once(':')?;
			name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
		})
		.unwrap_or(0);

	let mut body = buf[header_end..].to_vec();
	while body.len() < content_length {
		let n = stream.read(&mut chunk).await.expect("read failed");
		assert!(n > 0, "connection closed before response body");
		body.extend_from_slice(&chunk[..n]);
	}
	body.truncate(content_length);
	(status, String::from_utf8_lossy(&body).to_string())
}

/// A one-shot HTTP upstream: consumes a request head and replies with a fixed
/// body.
async fn spawn_upstream(body: &'static str) -> SocketAddr {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		while let Ok((mut stream, _)) = listener.accept().await {
			tokio::spawn(async move {
				let mut buf = Vec::new();
				let mut chunk = [0u8; 1024];
				loop {
					let n = stream.read(&mut chunk).await.unwrap_or(0);
					if n == 0 {
						return;
					}
					buf.extend_from_slice(&chunk[..n]);
					if buf.windows(4).any(|w| w == b"\r\n\r\n") {
						break;
					}
				}
				let response = format!(
					"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
					body.len(),
					body
				);
				let _ = stream.write_all(response.as_bytes()).await;
			});
		}
	});
	addr
}

/// A TCP echo server for tunnel tests.
async fn spawn_echo_server() -> SocketAddr {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		while let Ok((mut stream, _)) = listener.accept().await {
			tokio::spawn(async move {
				let (mut reader, mut writer) = stream.split();
				let _ = tokio::io::copy(&mut reader, &mut writer).await;
			});
		}
	});
	addr
}

async fn write_acl(dir: &Path, tenant: &str, contents: &str) {
	tokio::fs::write(dir.join(format!("{}.json", tenant)), contents).await.unwrap();
}

#[tokio::test]
async fn test_missing_credentials_rejected() {
	let acl_dir = tempfile::tempdir().unwrap();
	let (_server, addr) = start_proxy(acl_dir.path()).await;

	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(b"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\n\r\n")
		.await
		.unwrap();

	let (status, body) = read_response(&mut stream).await;
	assert_eq!(status, 401);
	assert_eq!(body, "Unauthorized: Authorization header required");
}

#[tokio::test]
async fn test_invalid_credentials_rejected() {
	let acl_dir = tempfile::tempdir().unwrap();
	let (_server, addr) = start_proxy(acl_dir.path()).await;

	let bogus = BASE64.encode("acme:wrong-key");
	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(
			format!(
				"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\nProxy-Authorization: Basic {}\r\n\r\n",
				bogus
			)
			.as_bytes(),
		)
		.await
		.unwrap();

	let (status, body) = read_response(&mut stream).await;
	assert_eq!(status, 401);
	assert_eq!(body, "Unauthorized: Invalid tenant_name or api_key");
}

#[tokio::test]
async fn test_unknown_tenant_file_denies() {
	let acl_dir = tempfile::tempdir().unwrap();
	let (_server, addr) = start_proxy(acl_dir.path()).await;

	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(
			format!(
				"GET http://example.com/ HTTP/1.1\r\nHost: example.com\r\nProxy-Authorization: {}\r\n\r\n",
				proxy_auth_header()
			)
			.as_bytes(),
		)
		.await
		.unwrap();

	let (status, body) = read_response(&mut stream).await;
	assert_eq!(status, 403);
	assert_eq!(body, "Forbidden: The request is blocked by policy.");
}

#[tokio::test]
async fn test_blacklist_beats_whitelist_on_connect() {
	let acl_dir = tempfile::tempdir().unwrap();
	write_acl(
		acl_dir.path(),
		TENANT,
		r#"{"Whitelist":["*.example.com"], "Blacklist":["api.example.com"]}"#,
	)
	.await;
	let (_server, addr) = start_proxy(acl_dir.path()).await;

	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(
			format!(
				"CONNECT api.example.com:443 HTTP/1.1\r\nHost: api.example.com:443\r\nProxy-Authorization: {}\r\n\r\n",
				proxy_auth_header()
			)
			.as_bytes(),
		)
		.await
		.unwrap();

	let (status, body) = read_response(&mut stream).await;
	assert_eq!(status, 403);
	assert_eq!(body, "Forbidden: The request is blocked by policy.");
}

#[tokio::test]
async fn test_forward_round_trip() {
	let upstream = spawn_upstream("hello from upstream").await;

	let acl_dir = tempfile::tempdir().unwrap();
	write_acl(acl_dir.path(), TENANT, r#"{"Whitelist":["127.0.0.1"]}"#).await;
	let (_server, addr) = start_proxy(acl_dir.path()).await;

	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(
			format!(
				"GET http://{}/ HTTP/1.1\r\nHost: {}\r\nProxy-Authorization: {}\r\n\r\n",
				upstream,
				upstream,
				proxy_auth_header()
			)
			.as_bytes(),
		)
		.await
		.unwrap();

	let (status, body) = read_response(&mut stream).await;
	assert_eq!(status, 200);
	assert_eq!(body, "hello from upstream");
}

#[tokio::test]
async fn test_connect_tunnel_echoes_bytes_unchanged() {
	let echo = spawn_echo_server().await;

	let acl_dir = tempfile::tempdir().unwrap();
	write_acl(acl_dir.path(), TENANT, r#"{"Whitelist":["127.0.0.1"]}"#).await;
	let (_server, addr) = start_proxy(acl_dir.path()).await;

	let mut stream = TcpStream::connect(addr).await.unwrap();
	stream
		.write_all(
			format!(
				"CONNECT {} HTTP/1.1\r\nHost: {}\r\nProxy-Authorization: {}\r\n\r\n",
				echo,
				echo,
				proxy_auth_header()
			)
			.as_bytes(),
		)
		.await
		.unwrap();

	// Consume the 200 response head
	let mut head = Vec::new();
	let mut byte = [0u8; 1];
	while !head.windows(4).any(|w| w == b"\r\n\r\n") {
		let n = stream.read(&mut byte).await.unwrap();
		assert!(n > 0, "connection closed during CONNECT handshake");
		head.extend_from_slice(&byte);
	}
	let head_str = String::from_utf8_lossy(&head);
	assert!(head_str.starts_with("HTTP/1.1 200"), "unexpected handshake: {}", head_str);

	// Pump a patterned payload through the tunnel and expect it back verbatim
	let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
	stream.write_all(&payload).await.unwrap();

	let mut echoed = vec![0u8; payload.len()];
	stream.read_exact(&mut echoed).await.unwrap();
	assert_eq!(echoed, payload);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_closes_listener() {
	let acl_dir = tempfile::tempdir().unwrap();
	let (server, addr) = start_proxy(acl_dir.path()).await;

	server.stop().await;
	server.stop().await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	// The listener is gone; a fresh connection cannot be established
	let connect = TcpStream::connect(addr).await;
	assert!(connect.is_err(), "listener still accepting after stop");
}

// vim: ts=4
