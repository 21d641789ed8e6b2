// Forwarding engine contract

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
};
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::proxy::context::RequestContext;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Body error: {0}")]
    Body(String),
}

pub type ForwardStream = BoxStream<'static, Result<Bytes, ForwardError>>;

/// Upstream response head plus a body that may still fail while streaming
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ForwardStream,
}

/// Streams an admitted request to its target.
///
/// Failures before a response head exists are returned as `Err`; failures
/// after that surface as an `Err` item in [`ForwardedResponse::body`].
#[async_trait]
pub trait ForwardingEngine: Send + Sync {
    async fn forward(
        &self,
        ctx: &RequestContext,
        request: Request,
    ) -> Result<ForwardedResponse, ForwardError>;
}
