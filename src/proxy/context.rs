// Per-request state threaded through the dispatch pipeline

use axum::{
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, Method},
    response::Response,
};
use std::net::SocketAddr;

use crate::proxy::middleware::RequestId;

/// Outcome of a single pipeline step
pub enum Flow {
    /// The step answered the request; nothing after it runs
    Respond(Response),
    /// Hand over to the next step
    Continue,
}

/// Everything the pipeline knows about one inbound request.
/// Created on arrival and dropped with the response; never shared.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Origin header value, empty string when absent
    pub origin: String,
    pub path: String,
    pub method: Method,
    pub host: Option<String>,
    pub remote_addr: Option<SocketAddr>,
    /// Headers written by pipeline steps, merged into the final response
    pub staged_headers: HeaderMap,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        // Only an absent header is empty; non-ASCII bytes are kept as latin1
        let origin = parts
            .headers
            .get(header::ORIGIN)
            .map(|h| latin1(h.as_bytes()))
            .unwrap_or_default();

        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        Self {
            request_id,
            origin,
            path: parts.uri.path().to_string(),
            method: parts.method.clone(),
            host: parts
                .headers
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            staged_headers: HeaderMap::new(),
        }
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
