use crate::error::{AppError, AppResult};
use crate::proxy::dispatcher::{dispatch, GatewayDispatcher};
use axum::{extract::ConnectInfo, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Build the gateway router: every path is handed to the dispatcher
pub fn build_router(dispatcher: Arc<GatewayDispatcher>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::proxy::middleware::logging_middleware,
        ))
        .with_state(dispatcher)
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    local_addr: SocketAddr,
}

impl AxumServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start Axum server
    pub async fn start(
        host: &str,
        port: u16,
        dispatcher: Arc<GatewayDispatcher>,
        tls: Option<TlsAcceptor>,
    ) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let app = build_router(dispatcher);

        // Bind address
        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind address {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        let scheme = if tls.is_some() { "https" } else { "http" };
        tracing::info!("Gateway started at {}://{}", scheme, local_addr);

        // Create shutdown channel
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            local_addr,
        };

        // Start server in new task
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, peer)) => {
                                let app = app.clone().layer(Extension(ConnectInfo(peer)));
                                let tls = tls.clone();
                                tokio::task::spawn(async move {
                                    match tls {
                                        Some(acceptor) => match acceptor.accept(stream).await {
                                            Ok(tls_stream) => serve_connection(tls_stream, app).await,
                                            Err(e) => debug!("TLS handshake with {} failed: {}", peer, e),
                                        },
                                        None => serve_connection(stream, app).await,
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Gateway stopped listening");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// Stop server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve_connection<S>(stream: S, app: Router)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    use hyper::server::conn::http1;
    use hyper_util::rt::TokioIo;
    use hyper_util::service::TowerToHyperService;

    let io = TokioIo::new(stream);
    let service = TowerToHyperService::new(app);

    if let Err(err) = http1::Builder::new()
        .serve_connection(io, service)
        .with_upgrades()
        .await
    {
        debug!("Connection handling finished or errored: {:?}", err);
    }
}
