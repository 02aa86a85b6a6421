//! CONNECT tunneling.
//!
//! After policy has allowed the target, the client connection is upgraded and
//! bytes are copied in both directions until either side closes. The bytes
//! are opaque: nothing after the 200 is parsed or interpreted.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::body::{ProxyBody, empty_body, text_response};
use crate::prelude::*;

const UPSTREAM_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Establish a CONNECT tunnel to the request target.
///
/// Replies 200 immediately and finishes the upgrade in a detached task, the
/// same order the hijack-based original used: a failed dial after that point
/// simply closes the client connection. The copy task owns both sockets;
/// either side reaching EOF or erroring tears the pair down, and a panic in
/// the task is contained by task isolation.
pub fn handle_connect(req: Request<Incoming>, peer_addr: &str) -> Response<ProxyBody> {
	let Some(authority) = req.uri().authority().cloned() else {
		return text_response(StatusCode::BAD_REQUEST, "Bad Request: missing host");
	};
	let target = authority.to_string();

	info!("CONNECT [{}] -> {}", peer_addr, target);

	tokio::spawn(async move {
		let upgraded = match hyper::upgrade::on(req).await {
			Ok(upgraded) => upgraded,
			Err(err) => {
				debug!("Tunnel upgrade for {} failed: {}", target, err);
				return;
			}
		};
		let mut client = TokioIo::new(upgraded);

		let mut upstream =
			match tokio::time::timeout(UPSTREAM_DIAL_TIMEOUT, TcpStream::connect(&target)).await {
				Ok(Ok(upstream)) => upstream,
				Ok(Err(err)) => {
					warn!("Tunnel dial to {} failed: {}", target, err);
					return;
				}
				Err(_) => {
					warn!("Tunnel dial to {} timed out", target);
					return;
				}
			};

		match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
			Ok((to_upstream, to_client)) => {
				debug!(
					"Tunnel to {} closed ({}B out, {}B in)",
					target, to_upstream, to_client
				);
			}
			Err(err) => {
				debug!("Tunnel to {} closed with error: {}", target, err);
			}
		}
		// Both streams drop here, closing the pair
	});

	// 200 tells the client to start sending; the upgrade completes once this
	// response is written
	Response::builder()
		.status(StatusCode::OK)
		.body(empty_body())
		.unwrap_or_else(|_| text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
}

// vim: ts=4
