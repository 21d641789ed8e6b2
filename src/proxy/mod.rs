// proxy module - origin-gated CORS gateway

pub mod common;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod handlers; // Reserved routes
pub mod middleware; // CORS and request logging
pub mod server;
pub mod tls;
pub mod upstream; // Forwarding engine and failure sanitizer

pub use config::ProxyConfig;
pub use dispatcher::GatewayDispatcher;
pub use server::AxumServer;
