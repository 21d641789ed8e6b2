// Upstream client implementation
// reqwest-backed forwarding engine

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue},
};
use futures::StreamExt;
use reqwest::Client;
use url::Url;

use super::engine::{ForwardError, ForwardedResponse, ForwardingEngine};
use crate::error::{AppError, AppResult};
use crate::proxy::config::ForwardingOptions;
use crate::proxy::context::RequestContext;

/// Largest request body buffered before forwarding
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Headers scoped to a single connection, never forwarded in either direction
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct HttpForwarder {
    http_client: Client,
    target: Option<Url>,
    xfwd: bool,
    listener_tls: bool,
}

impl HttpForwarder {
    pub fn new(options: &ForwardingOptions, listener_tls: bool) -> AppResult<Self> {
        let target = match &options.target {
            Some(raw) => Some(parse_http_url(raw).map_err(|e| AppError::Config(e.to_string()))?),
            None => None,
        };

        Ok(Self {
            http_client: crate::utils::http::create_client(options)?,
            target,
            xfwd: options.xfwd,
            listener_tls,
        })
    }

    /// Build the upstream URL.
    ///
    /// With a fixed target the request path and query are appended to it,
    /// otherwise the path itself must carry an absolute URL: `/https://host/x`.
    fn resolve_target(&self, path_and_query: &str) -> Result<Url, ForwardError> {
        match &self.target {
            Some(base) => {
                let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path_and_query);
                parse_http_url(&joined)
            }
            None => parse_http_url(path_and_query.trim_start_matches('/')),
        }
    }

    fn build_headers(&self, ctx: &RequestContext, incoming: &HeaderMap) -> HeaderMap {
        let mut headers = strip_hop_by_hop(incoming);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        if self.xfwd {
            let proto = if self.listener_tls { "https" } else { "http" };
            let port = ctx
                .host
                .as_deref()
                .and_then(|h| h.rsplit_once(':'))
                .filter(|(_, p)| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                .map(|(_, p)| p.to_string())
                .unwrap_or_else(|| if self.listener_tls { "443" } else { "80" }.to_string());

            if let Some(addr) = ctx.remote_addr {
                append_forwarded(&mut headers, "x-forwarded-for", &addr.ip().to_string());
            }
            append_forwarded(&mut headers, "x-forwarded-port", &port);
            append_forwarded(&mut headers, "x-forwarded-proto", proto);
            if let Some(host) = &ctx.host {
                append_forwarded(&mut headers, "x-forwarded-host", host);
            }
        }

        headers
    }
}

#[async_trait]
impl ForwardingEngine for HttpForwarder {
    async fn forward(
        &self,
        ctx: &RequestContext,
        request: Request,
    ) -> Result<ForwardedResponse, ForwardError> {
        let (parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());

        let url = self.resolve_target(path_and_query)?;
        tracing::debug!(request_id = %ctx.request_id, url = %url, "Forwarding upstream");

        let headers = self.build_headers(ctx, &parts.headers);
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| ForwardError::Body(e.to_string()))?;

        let response = self
            .http_client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers());
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ForwardError::from))
            .boxed();

        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}

fn parse_http_url(raw: &str) -> Result<Url, ForwardError> {
    let url = Url::parse(raw).map_err(|e| ForwardError::InvalidTarget(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(ForwardError::InvalidTarget(format!(
            "{}: expected an absolute http(s) URL",
            raw
        ))),
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP {
        out.remove(name);
    }
    out
}

/// Append to an existing X-Forwarded-* value the way proxies chain them
fn append_forwarded(headers: &mut HeaderMap, name: &'static str, value: &str) {
    let name = HeaderName::from_static(name);
    let combined = match headers.get(&name).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{},{}", existing, value),
        None => value.to_string(),
    };
    if let Ok(v) = HeaderValue::from_str(&combined) {
        headers.insert(name, v);
    }
}
