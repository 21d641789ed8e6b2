// Reserved routes: operator dashboard and stats endpoint
//
// These are answered before any origin check.
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::proxy::common::StatsRegistry;

pub const DASHBOARD_ROUTE: &str = "/proxy";
pub const STATS_ROUTE: &str = "/api/stats";

const DASHBOARD_MISSING: &str = "Dashboard file missing.";

pub struct SpecialRouteResolver {
    dashboard_file: PathBuf,
    stats: Arc<StatsRegistry>,
}

impl SpecialRouteResolver {
    pub fn new(dashboard_file: PathBuf, stats: Arc<StatsRegistry>) -> Self {
        Self {
            dashboard_file,
            stats,
        }
    }

    /// Answer the request target (path plus any query) if it is reserved,
    /// otherwise `None`. A query string makes the target unreserved.
    pub async fn try_handle(&self, target: &str) -> Option<Response> {
        if is_dashboard_path(target) {
            return Some(self.serve_dashboard().await);
        }
        if target == STATS_ROUTE {
            return Some(self.serve_stats());
        }
        None
    }

    async fn serve_dashboard(&self) -> Response {
        match tokio::fs::read(&self.dashboard_file).await {
            Ok(html) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html")],
                html,
            )
                .into_response(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read dashboard asset {:?}: {}",
                    self.dashboard_file,
                    e
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain")],
                    DASHBOARD_MISSING,
                )
                    .into_response()
            }
        }
    }

    fn serve_stats(&self) -> Response {
        Json(self.stats.snapshot()).into_response()
    }
}

fn is_dashboard_path(path: &str) -> bool {
    path.strip_suffix('/').unwrap_or(path) == DASHBOARD_ROUTE
}
