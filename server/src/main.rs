//! The Tollgate daemon.
//!
//! Loads configuration, opens the credential store, runs the bootstrap, and
//! starts the three long-lived pieces: the proxy dataplane, the admin control
//! plane and (when configured) the ACL git sync loop.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{
	EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use tollgate_core::app::AppState;
use tollgate_core::config::Config;
use tollgate_cred_adapter_sqlite::CredAdapterSqlite;
use tollgate_proxy::ProxyServer;
use tollgate_types::prelude::*;
use tollgate_types::utils::{API_KEY_LENGTH, random_token};

mod bootstrap;

/// How long shutdown waits for in-flight proxy requests.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
	let filter_handle = init_tracing();

	if let Err(err) = run(filter_handle).await {
		error!("FATAL: {}", err);
		std::process::exit(1);
	}
}

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Start logging at `info` so configuration loading can report problems; the
/// configured level is applied right after, unless `RUST_LOG` overrides it.
fn init_tracing() -> FilterHandle {
	let (filter, handle) = reload::Layer::new(
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
	);
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.init();
	handle
}

async fn run(filter_handle: FilterHandle) -> TgResult<()> {
	let mut config = Config::load()?;

	if std::env::var("RUST_LOG").is_err() {
		let log_level = config.log_level.clone();
		let _ = filter_handle.modify(|filter| *filter = EnvFilter::new(log_level.as_ref()));
	}

	info!("Tollgate v{} starting", tollgate_core::app::VERSION);

	if config.admin.api_key.is_empty() {
		let generated = random_token(API_KEY_LENGTH)?;
		info!("Generated admin API key: {}", generated);
		config.admin.api_key = generated.into();
	}

	let cred_adapter = Arc::new(CredAdapterSqlite::new(&config.database.file_path).await?);
	let app = AppState::new(config, cred_adapter);

	bootstrap::init(&app).await?;

	// ACL git synchronization, if a remote is configured
	tollgate_sync::start(app.config.git_acl.clone());

	// Admin control plane
	let admin_router = tollgate_admin::init(app.clone());
	let admin_listener = tokio::net::TcpListener::bind(app.config.admin.addr).await?;
	info!("Admin server started at {}", app.config.admin.addr);
	let admin_server =
		tokio::spawn(async move { axum::serve(admin_listener, admin_router).await });

	// Proxy dataplane
	let proxy_server = ProxyServer::new(app.clone());
	proxy_server.start().await?;

	tokio::signal::ctrl_c().await?;
	info!("Servers are shutting down");

	proxy_server.stop().await;
	proxy_server.drain(SHUTDOWN_DRAIN).await;
	admin_server.abort();

	info!("Gracefully stopped");
	Ok(())
}

// vim: ts=4
