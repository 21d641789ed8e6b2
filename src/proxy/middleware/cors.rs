// CORS negotiation
//
// Headers are always permissive ("*"); admission is decided separately by the
// origin policy before this step runs.

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode},
    response::Response,
};

use crate::proxy::context::{Flow, RequestContext};

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

#[derive(Debug, Clone, Copy, Default)]
pub struct CorsNegotiator;

impl CorsNegotiator {
    pub fn new() -> Self {
        Self
    }

    /// Stage the CORS headers and answer preflight requests directly
    pub fn apply(&self, ctx: &mut RequestContext) -> Flow {
        let headers = &mut ctx.staged_headers;
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );

        if ctx.method != Method::OPTIONS {
            return Flow::Continue;
        }

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        *response.headers_mut() = headers.clone();
        Flow::Respond(response)
    }
}
