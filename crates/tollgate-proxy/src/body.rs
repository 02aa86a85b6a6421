//! Response body plumbing shared by the dataplane handlers.

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, combinators::BoxBody};
use hyper::{Response, StatusCode};

/// Unified body type: forwarded upstream bodies stream through, synthesized
/// bodies are full buffers.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Create an empty body.
pub fn empty_body() -> ProxyBody {
	Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Create a body from bytes.
pub fn full_body(bytes: impl Into<Bytes>) -> ProxyBody {
	Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

/// Build a plain-text response with guaranteed success.
pub fn text_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
	Response::builder()
		.status(status)
		.header("Content-Type", "text/plain")
		.body(full_body(message.to_string()))
		.unwrap_or_else(|_| {
			let mut res = Response::new(full_body("Internal error"));
			*res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
			res
		})
}


// vim: ts=4
