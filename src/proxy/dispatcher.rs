//! Per-request admission pipeline.
//!
//! Steps run in a fixed order and each either answers the request or hands it
//! on: reserved routes, origin admission, CORS, accounting, forwarding.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::proxy::common::{OriginPolicy, StatsRegistry};
use crate::proxy::context::{Flow, RequestContext};
use crate::proxy::handlers::SpecialRouteResolver;
use crate::proxy::middleware::CorsNegotiator;
use crate::proxy::upstream::body::GuardedBody;
use crate::proxy::upstream::{Disposition, ErrorSanitizer, ForwardingEngine, ResponseState};

pub struct GatewayDispatcher {
    special_routes: SpecialRouteResolver,
    policy: Arc<OriginPolicy>,
    cors: CorsNegotiator,
    stats: Arc<StatsRegistry>,
    engine: Arc<dyn ForwardingEngine>,
    sanitizer: ErrorSanitizer,
}

impl GatewayDispatcher {
    pub fn new(
        policy: Arc<OriginPolicy>,
        stats: Arc<StatsRegistry>,
        dashboard_file: PathBuf,
        engine: Arc<dyn ForwardingEngine>,
    ) -> Self {
        Self {
            special_routes: SpecialRouteResolver::new(dashboard_file, stats.clone()),
            policy,
            cors: CorsNegotiator::new(),
            stats,
            engine,
            sanitizer: ErrorSanitizer::new(),
        }
    }

    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }

    pub async fn handle(&self, request: Request) -> Response {
        // Reserved routes match the full request target, query included
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string());
        if let Some(response) = self.special_routes.try_handle(&target).await {
            return response;
        }

        let (parts, body) = request.into_parts();
        let mut ctx = RequestContext::from_parts(&parts);

        if let Flow::Respond(response) = self.admit(&ctx) {
            return response;
        }
        if let Flow::Respond(response) = self.cors.apply(&mut ctx) {
            return response;
        }

        self.stats.increment();

        self.forward(ctx, Request::from_parts(parts, body)).await
    }

    /// Reject origins the policy does not admit. Runs before CORS so a rejected
    /// browser gets no permissive headers.
    fn admit(&self, ctx: &RequestContext) -> Flow {
        if self.policy.is_allowed(&ctx.origin) {
            return Flow::Continue;
        }

        tracing::debug!(
            request_id = %ctx.request_id,
            origin = %ctx.origin,
            "Origin rejected by policy"
        );
        Flow::Respond(
            (
                StatusCode::FORBIDDEN,
                [(header::CONTENT_TYPE, "text/plain")],
                format!(
                    "The origin \"{}\" was blacklisted by the operator of this proxy.",
                    ctx.origin
                ),
            )
                .into_response(),
        )
    }

    async fn forward(&self, ctx: RequestContext, request: Request) -> Response {
        let forwarded = match self.engine.forward(&ctx, request).await {
            Ok(forwarded) => forwarded,
            Err(err) => {
                return match self.sanitizer.on_error(&err, &ctx, ResponseState::Pending) {
                    Disposition::Replace(response) => response,
                    // Nothing was written for a pending response, close it empty
                    Disposition::CloseStream | Disposition::Ignore => Response::new(Body::empty()),
                };
            }
        };

        // Upstream headers replace staged ones of the same name
        let mut headers = ctx.staged_headers.clone();
        for name in forwarded.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in forwarded.headers.iter() {
            headers.append(name.clone(), value.clone());
        }

        let body = GuardedBody::new(forwarded.body, ctx, self.sanitizer);
        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = forwarded.status;
        *response.headers_mut() = headers;
        response
    }
}

/// Router fallback: every path goes through the dispatcher
pub async fn dispatch(
    State(dispatcher): State<Arc<GatewayDispatcher>>,
    request: Request,
) -> Response {
    dispatcher.handle(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::upstream::{ForwardError, ForwardedResponse};
    use async_trait::async_trait;
    use axum::http::{HeaderMap, HeaderValue, Method, Request};
    use bytes::Bytes;
    use futures::StreamExt;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted engine: answers 200 "upstream", or fails before/while streaming
    enum Script {
        Ok,
        FailBeforeHead,
        FailMidStream,
    }

    struct MockEngine {
        script: Script,
        calls: AtomicUsize,
    }

    impl MockEngine {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ForwardingEngine for MockEngine {
        async fn forward(
            &self,
            _ctx: &RequestContext,
            _request: Request<Body>,
        ) -> Result<ForwardedResponse, ForwardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut headers = HeaderMap::new();
            headers.insert("x-upstream", HeaderValue::from_static("1"));
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("http://upstream.example"),
            );

            let chunks: Vec<Result<Bytes, ForwardError>> = match self.script {
                Script::Ok => vec![Ok(Bytes::from_static(b"upstream"))],
                Script::FailBeforeHead => {
                    return Err(ForwardError::InvalidTarget("connect ECONNREFUSED".to_string()))
                }
                Script::FailMidStream => vec![
                    Ok(Bytes::from_static(b"partial")),
                    Err(ForwardError::Body("socket hang up".to_string())),
                ],
            };

            Ok(ForwardedResponse {
                status: StatusCode::OK,
                headers,
                body: futures::stream::iter(chunks).boxed(),
            })
        }
    }

    fn dispatcher(
        whitelist: &[&str],
        blacklist: &[&str],
        engine: Arc<MockEngine>,
        dashboard_file: PathBuf,
    ) -> GatewayDispatcher {
        let policy = OriginPolicy::new(
            whitelist.iter().map(|s| s.to_string()),
            blacklist.iter().map(|s| s.to_string()),
        );
        GatewayDispatcher::new(
            Arc::new(policy),
            Arc::new(StatsRegistry::new()),
            dashboard_file,
            engine,
        )
    }

    fn request(method: Method, path: &str, origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_blacklisted_origin_gets_403_without_cors() {
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&[], &["http://bad.com"], engine.clone(), PathBuf::from("x"));

        let response = d
            .handle(request(Method::GET, "/https://example.com/", Some("http://bad.com")))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
        let body = body_string(response).await;
        assert_eq!(
            body,
            "The origin \"http://bad.com\" was blacklisted by the operator of this proxy."
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.stats().total_requests(), 0);
    }

    #[tokio::test]
    async fn test_preflight_is_answered_and_not_counted() {
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&["*"], &[], engine.clone(), PathBuf::from("x"));

        let response = d
            .handle(request(Method::OPTIONS, "/https://example.com/", Some("http://a.com")))
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        for name in [
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::ACCESS_CONTROL_ALLOW_METHODS,
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        ] {
            assert!(response.headers().contains_key(&name), "missing {}", name);
        }
        assert!(body_string(response).await.is_empty());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.stats().total_requests(), 0);
    }

    #[tokio::test]
    async fn test_stats_after_three_admitted_requests() {
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&[], &["http://bad.com"], engine.clone(), PathBuf::from("x"));

        for _ in 0..3 {
            let response = d
                .handle(request(Method::GET, "/https://example.com/", None))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        // Neither of these is counted
        d.handle(request(Method::GET, "/x", Some("http://bad.com"))).await;
        d.handle(request(Method::GET, "/proxy", None)).await;

        let response = d.handle(request(Method::GET, "/api/stats", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["requests"], 3);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_special_routes_bypass_policy() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<html></html>").unwrap();
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&["http://only.com"], &[], engine, file.path().to_path_buf());

        let response = d
            .handle(request(Method::GET, "/proxy/", Some("http://other.com")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

        let response = d
            .handle(request(Method::GET, "/api/stats", Some("http://other.com")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reserved_path_with_query_goes_through_admission() {
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&["http://only.com"], &[], engine.clone(), PathBuf::from("x"));

        let response = d.handle(request(Method::GET, "/api/stats?t=1", None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_string(response).await,
            "The origin \"\" was blacklisted by the operator of this proxy."
        );

        // Admitted, it is forwarded and counted instead of served locally
        let response = d
            .handle(request(Method::GET, "/proxy?x", Some("http://only.com")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "upstream");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(d.stats().total_requests(), 1);
    }

    #[tokio::test]
    async fn test_malformed_origin_is_not_treated_as_absent() {
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&[""], &[], engine.clone(), PathBuf::from("x"));

        let malformed = Request::builder()
            .uri("/https://example.com/")
            .header(
                header::ORIGIN,
                HeaderValue::from_bytes(b"http://\xE9vil.com").unwrap(),
            )
            .body(Body::empty())
            .unwrap();
        let response = d.handle(malformed).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_string(response).await,
            "The origin \"http://\u{e9}vil.com\" was blacklisted by the operator of this proxy."
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.stats().total_requests(), 0);

        // A truly absent header still matches the empty whitelist entry
        let response = d
            .handle(request(Method::GET, "/https://example.com/", None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_dashboard_degrades_to_500() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&[], &[], engine, dir.path().join("missing.html"));

        let response = d.handle(request(Method::GET, "/proxy", None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Dashboard file missing.");
    }

    #[tokio::test]
    async fn test_forwarded_response_merges_headers() {
        let engine = MockEngine::new(Script::Ok);
        let d = dispatcher(&[], &[], engine, PathBuf::from("x"));

        let response = d
            .handle(request(Method::GET, "/https://example.com/", Some("http://a.com")))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["x-upstream"], "1");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://upstream.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(body_string(response).await, "upstream");
    }

    #[tokio::test]
    async fn test_failure_before_head_becomes_404() {
        let engine = MockEngine::new(Script::FailBeforeHead);
        let d = dispatcher(&[], &[], engine, PathBuf::from("x"));

        let response = d
            .handle(request(Method::GET, "/https://example.com/", None))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
        let body = body_string(response).await;
        assert!(body.starts_with("Not found because of proxy error:"));
        assert!(body.contains("ECONNREFUSED"));
        // Admitted before the failure, so it still counts
        assert_eq!(d.stats().total_requests(), 1);
    }

    #[tokio::test]
    async fn test_failure_mid_stream_closes_body() {
        let engine = MockEngine::new(Script::FailMidStream);
        let d = dispatcher(&[], &[], engine, PathBuf::from("x"));

        let response = d
            .handle(request(Method::GET, "/https://example.com/", None))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "partial");
    }

    #[tokio::test]
    async fn test_gateway_survives_repeated_failures() {
        let engine = MockEngine::new(Script::FailBeforeHead);
        let d = dispatcher(&[], &[], engine.clone(), PathBuf::from("x"));

        for _ in 0..5 {
            let response = d.handle(request(Method::POST, "/nowhere", None)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 5);
    }
}
