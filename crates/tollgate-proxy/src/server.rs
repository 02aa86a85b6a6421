//! The proxy dispatcher: accepts connections, applies limits and timeouts,
//! and runs each request through authenticate → ACL → forward/tunnel.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, Semaphore, oneshot};

use crate::acl::AclStore;
use crate::auth::{self, AuthCache};
use crate::body::{ProxyBody, text_response};
use crate::handler;
use crate::prelude::*;
use crate::tunnel;

const POLICY_DENIED_BODY: &str = "Forbidden: The request is blocked by policy.";

/// State shared across proxy connections.
pub struct ProxyState {
	app: App,
	auth_cache: AuthCache,
	acl: AclStore,
	client: Client<HttpConnector, Incoming>,
	limiter: Arc<Semaphore>,
	conns_per_ip: Mutex<HashMap<IpAddr, usize>>,
}

/// The proxy server: binds the dataplane listener and owns its shutdown
/// handle. `stop` is idempotent; `drain` waits for in-flight requests.
pub struct ProxyServer {
	state: Arc<ProxyState>,
	addr: RwLock<Option<SocketAddr>>,
	shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
}

impl ProxyServer {
	pub fn new(app: App) -> Self {
		let client = Client::builder(TokioExecutor::new()).build_http();
		let state = Arc::new(ProxyState {
			auth_cache: AuthCache::new(),
			acl: AclStore::new(&app.config.acl_data_path),
			client,
			limiter: Arc::new(Semaphore::new(app.config.proxy.max_concurrent)),
			conns_per_ip: Mutex::new(HashMap::new()),
			app,
		});
		Self { state, addr: RwLock::new(None), shutdown_tx: RwLock::new(None) }
	}

	/// Bind the configured listen address and start serving. Returns the
	/// bound address (the configured port may be 0 in tests).
	pub async fn start(&self) -> TgResult<SocketAddr> {
		let listen = self.state.app.config.proxy.addr;
		let listener = TcpListener::bind(listen).await?;
		let addr = listener.local_addr()?;
		*self.addr.write().await = Some(addr);

		let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
		*self.shutdown_tx.write().await = Some(shutdown_tx);

		let state = self.state.clone();
		let idle_timeout = state.app.config.proxy.timeout * 3;

		tokio::spawn(async move {
			info!("Proxy server started at {}", addr);

			loop {
				tokio::select! {
					accept_result = listener.accept() => {
						match accept_result {
							Ok((stream, peer_addr)) => {
								let Some(conn_guard) = ConnGuard::try_register(&state, peer_addr.ip()) else {
									debug!("Connection cap reached for {}, dropping", peer_addr.ip());
									continue;
								};
								serve_connection(state.clone(), stream, peer_addr, conn_guard, idle_timeout);
							}
							Err(err) => {
								error!("Proxy accept error: {}", err);
							}
						}
					}
					_ = &mut shutdown_rx => {
						info!("Proxy server shutting down");
						break;
					}
				}
			}
		});

		Ok(addr)
	}

	/// Stop accepting connections. Safe to call more than once.
	pub async fn stop(&self) {
		if let Some(tx) = self.shutdown_tx.write().await.take() {
			let _ = tx.send(());
		}
	}

	/// Wait for in-flight requests to finish, bounded by `deadline`.
	/// In-flight requests keep their own timeouts either way.
	pub async fn drain(&self, deadline: Duration) {
		let max = self.state.app.config.proxy.max_concurrent as u32;
		if tokio::time::timeout(deadline, self.state.limiter.acquire_many(max)).await.is_err() {
			warn!("Proxy drain deadline reached with requests still in flight");
		}
	}

	/// The address the proxy is listening on.
	pub async fn addr(&self) -> Option<SocketAddr> {
		*self.addr.read().await
	}
}

/// Spawn the serving task for one accepted connection.
fn serve_connection(
	state: Arc<ProxyState>,
	stream: tokio::net::TcpStream,
	peer_addr: SocketAddr,
	conn_guard: ConnGuard,
	idle_timeout: Duration,
) {
	tokio::spawn(async move {
		let _conn_guard = conn_guard;
		let io = TokioIo::new(stream);
		let request_count = Arc::new(AtomicUsize::new(0));

		let service = service_fn(move |req| {
			let state = state.clone();
			let request_count = request_count.clone();
			async move { handle_request(req, state, peer_addr, &request_count).await }
		});

		let mut builder = http1::Builder::new();
		builder
			.timer(TokioTimer::new())
			.header_read_timeout(idle_timeout)
			.preserve_header_case(true);
		if let Err(err) = builder.serve_connection(io, service).with_upgrades().await {
			debug!("Proxy connection from {} ended: {}", peer_addr, err);
		}
	});
}

/// Handle an incoming proxy request.
async fn handle_request(
	req: Request<Incoming>,
	state: Arc<ProxyState>,
	peer_addr: SocketAddr,
	request_count: &AtomicUsize,
) -> Result<Response<ProxyBody>, Infallible> {
	state.app.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

	let served = request_count.fetch_add(1, Ordering::SeqCst) + 1;
	let close_after = served >= state.app.config.proxy.max_requests_per_conn;

	// Concurrency cap; the permit covers request handling, not tunnel lifetime
	let permit = match state.limiter.clone().try_acquire_owned() {
		Ok(permit) => permit,
		Err(_) => {
			warn!("Concurrency limit reached, rejecting request from {}", peer_addr);
			return Ok(text_response(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable"));
		}
	};

	let mut res = dispatch(req, &state, peer_addr).await;
	drop(permit);

	if close_after {
		res.headers_mut().insert(header::CONNECTION, header::HeaderValue::from_static("close"));
	}
	Ok(res)
}

/// Authenticate, evaluate policy, then forward or tunnel.
///
/// The tenant name returned by the authenticator is handed straight to the
/// ACL evaluator; nothing about the authenticated identity lives outside this
/// call.
async fn dispatch(
	req: Request<Incoming>,
	state: &Arc<ProxyState>,
	peer_addr: SocketAddr,
) -> Response<ProxyBody> {
	let tenant_name =
		match auth::authenticate(&state.auth_cache, &state.app.cred_adapter, req.headers()).await
		{
			Ok(tenant_name) => tenant_name,
			Err(failure) => {
				state.app.metrics.auth_failures.fetch_add(1, Ordering::Relaxed);
				debug!("Authentication failed for [{}]: {:?}", peer_addr, failure);
				return text_response(StatusCode::UNAUTHORIZED, failure.message());
			}
		};

	let Some(target) = request_target(&req) else {
		return text_response(StatusCode::BAD_REQUEST, "Bad Request: missing host");
	};

	info!("REQ [{}] {} {} {}", peer_addr, tenant_name, req.method(), target);
	state.app.metrics.observe_tenant(&tenant_name);

	if !state.acl.is_request_allowed(&target, &tenant_name).await {
		state.app.metrics.requests_denied.fetch_add(1, Ordering::Relaxed);
		debug!("Request to {} by tenant {} blocked by ACL policy", target, tenant_name);
		return text_response(StatusCode::FORBIDDEN, POLICY_DENIED_BODY);
	}

	if req.method() == Method::CONNECT {
		state.app.metrics.tunnels_opened.fetch_add(1, Ordering::Relaxed);
		tunnel::handle_connect(req, &peer_addr.to_string())
	} else {
		handler::forward_request(&state.client, req, state.app.config.proxy.timeout).await
	}
}

/// The host[:port] a request is aimed at: the request-target authority for
/// CONNECT and absolute-form requests, the Host header otherwise.
fn request_target(req: &Request<Incoming>) -> Option<String> {
	if let Some(authority) = req.uri().authority() {
		return Some(authority.as_str().to_string());
	}
	req.headers()
		.get(header::HOST)
		.and_then(|host| host.to_str().ok())
		.map(str::to_string)
}

/// Per-source-IP connection accounting; the guard releases its slot on drop.
struct ConnGuard {
	state: Arc<ProxyState>,
	ip: IpAddr,
}

impl ConnGuard {
	fn try_register(state: &Arc<ProxyState>, ip: IpAddr) -> Option<ConnGuard> {
		let mut conns = match state.conns_per_ip.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		let count = conns.entry(ip).or_insert(0);
		if *count >= state.app.config.proxy.max_conns_per_ip {
			return None;
		}
		*count += 1;
		Some(ConnGuard { state: state.clone(), ip })
	}
}

impl Drop for ConnGuard {
	fn drop(&mut self) {
		let mut conns = match self.state.conns_per_ip.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};
		if let Some(count) = conns.get_mut(&self.ip) {
			*count -= 1;
			if *count == 0 {
				conns.remove(&self.ip);
			}
		}
	}
}

// vim: ts=4
