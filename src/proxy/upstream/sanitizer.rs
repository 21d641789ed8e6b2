// Upstream failure sanitizer
//
// Every forwarding failure ends here, whether it happened before the response
// head was produced or while the body was streaming.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};

use super::engine::ForwardError;
use crate::proxy::context::RequestContext;

/// How far the client response has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Pending,
    HeadersSent,
    Finished,
}

/// What the caller must do with the failed response
#[derive(Debug)]
pub enum Disposition {
    /// Nothing was sent yet: answer with this instead
    Replace(Response),
    /// Headers are out: end the body where it is
    CloseStream,
    /// The response already completed
    Ignore,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorSanitizer;

impl ErrorSanitizer {
    pub fn new() -> Self {
        Self
    }

    pub fn on_error(
        &self,
        err: &ForwardError,
        ctx: &RequestContext,
        state: ResponseState,
    ) -> Disposition {
        tracing::error!(
            request_id = %ctx.request_id,
            path = %ctx.path,
            state = ?state,
            "Proxy error: {}",
            err
        );

        match state {
            ResponseState::HeadersSent => Disposition::CloseStream,
            ResponseState::Finished => Disposition::Ignore,
            // Staged headers are dropped on purpose: only the fixed failure head goes out
            ResponseState::Pending => Disposition::Replace(failure_response(err)),
        }
    }
}

fn failure_response(err: &ForwardError) -> Response {
    let mut response = Response::new(Body::from(format!(
        "Not found because of proxy error: {}",
        err
    )));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
