//! Plain HTTP forwarding for non-CONNECT methods.
//!
//! The request is re-issued upstream through a shared pooled client with a
//! per-request timeout; the upstream response streams back to the client.
//! Hop-by-hop headers are stripped in both directions.

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderName};
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use std::time::Duration;

use crate::body::{ProxyBody, text_response};
use crate::prelude::*;

/// Headers that must not travel across the proxy hop (RFC 7230 §6.1).
const HOP_BY_HOP_HEADERS: &[&str] = &[
	"connection",
	"keep-alive",
	"proxy-authenticate",
	"proxy-authorization",
	"te",
	"trailers",
	"transfer-encoding",
	"upgrade",
];

/// Check if a header is a hop-by-hop header that should be stripped
fn is_hop_by_hop(name: &HeaderName) -> bool {
	HOP_BY_HOP_HEADERS.iter().any(|h| name.as_str().eq_ignore_ascii_case(h))
}

/// Copy non-hop-by-hop headers from source to destination
fn copy_headers(src: &HeaderMap, dst: &mut HeaderMap) {
	for (name, value) in src.iter() {
		if is_hop_by_hop(name) {
			continue;
		}
		dst.append(name.clone(), value.clone());
	}
}

/// Resolve the upstream URI: the absolute-form request target, or one built
/// from the Host header for clients that send origin-form.
fn upstream_uri(req: &Request<Incoming>) -> Option<Uri> {
	if req.uri().scheme().is_some() {
		return Some(req.uri().clone());
	}
	let host = req.headers().get(hyper::header::HOST)?.to_str().ok()?;
	let path_and_query =
		req.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
	format!("http://{}{}", host, path_and_query).parse().ok()
}

/// Forward one request upstream and relay the response.
pub async fn forward_request(
	client: &Client<HttpConnector, Incoming>,
	req: Request<Incoming>,
	timeout: Duration,
) -> Response<ProxyBody> {
	let Some(uri) = upstream_uri(&req) else {
		return text_response(StatusCode::BAD_REQUEST, "Bad Request: missing host");
	};

	let method = req.method().clone();
	let headers = req.headers().clone();
	let body = req.into_body();

	let mut upstream_req = Request::builder().method(method).uri(uri.clone());
	if let Some(dst) = upstream_req.headers_mut() {
		copy_headers(&headers, dst);
	}
	let upstream_req = match upstream_req.body(body) {
		Ok(req) => req,
		Err(err) => {
			warn!("Failed to build upstream request for {}: {}", uri, err);
			return text_response(StatusCode::BAD_REQUEST, "Bad Request");
		}
	};

	match tokio::time::timeout(timeout, client.request(upstream_req)).await {
		Ok(Ok(mut res)) => {
			let stripped: Vec<HeaderName> =
				res.headers().keys().filter(|name| is_hop_by_hop(name)).cloned().collect();
			for name in stripped {
				res.headers_mut().remove(&name);
			}
			res.map(|body| body.boxed())
		}
		Ok(Err(err)) => {
			warn!("Upstream request to {} failed: {}", uri, err);
			text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
		}
		Err(_) => {
			warn!("Upstream request to {} timed out", uri);
			text_response(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout")
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_hop_by_hop() {
		assert!(is_hop_by_hop(&HeaderName::from_static("connection")));
		assert!(is_hop_by_hop(&HeaderName::from_static("proxy-authorization")));
		assert!(is_hop_by_hop(&HeaderName::from_static("transfer-encoding")));
		assert!(!is_hop_by_hop(&HeaderName::from_static("content-type")));
		assert!(!is_hop_by_hop(&HeaderName::from_static("host")));
	}

	#[test]
	fn test_copy_headers_strips_credentials() {
		let mut src = HeaderMap::new();
		src.insert("content-type", "text/plain".parse().unwrap());
		src.insert("proxy-authorization", "Basic abc".parse().unwrap());
		src.insert("connection", "keep-alive".parse().unwrap());

		let mut dst = HeaderMap::new();
		copy_headers(&src, &mut dst);

		assert!(dst.contains_key("content-type"));
		assert!(!dst.contains_key("proxy-authorization"));
		assert!(!dst.contains_key("connection"));
	}
}

// vim: ts=4
