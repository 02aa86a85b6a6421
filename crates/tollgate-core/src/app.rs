//! App state type

use std::sync::Arc;

use tollgate_types::cred_adapter::CredAdapter;

use crate::config::Config;
use crate::metrics::Metrics;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state: configuration, the credential store and the
/// counters the dataplane publishes.
#[derive(Debug)]
pub struct AppState {
	pub config: Config,
	pub cred_adapter: Arc<dyn CredAdapter>,
	pub metrics: Metrics,
}

pub type App = Arc<AppState>;

impl AppState {
	pub fn new(config: Config, cred_adapter: Arc<dyn CredAdapter>) -> App {
		Arc::new(AppState { config, cred_adapter, metrics: Metrics::new() })
	}
}

// vim: ts=4
