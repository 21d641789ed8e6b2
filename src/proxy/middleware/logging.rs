// Request logging middleware
use axum::{extract::Request, middleware::Next, response::Response};

/// Correlation id attached to every inbound request
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Tag the request with an id and log method, URI and final status
pub async fn logging_middleware(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    tracing::info!(request_id = %request_id, "Request: {} {}", method, uri);
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let response = next.run(request).await;

    tracing::debug!(
        request_id = %request_id,
        status = response.status().as_u16(),
        "Response head ready for {} {}",
        method,
        uri
    );
    response
}
