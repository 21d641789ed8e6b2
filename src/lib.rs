pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Gateway service module
mod utils;

use std::sync::Arc;

use error::AppResult;
use models::AppConfig;
use proxy::common::{OriginPolicy, StatsRegistry};
use proxy::upstream::HttpForwarder;
use proxy::{AxumServer, GatewayDispatcher};
use tracing::{info, warn};

/// Wire the gateway from config and start listening
pub async fn start_gateway(
    config: &AppConfig,
) -> AppResult<(AxumServer, tokio::task::JoinHandle<()>)> {
    let proxy_config = &config.proxy;

    let tls = proxy_config
        .tls
        .as_ref()
        .map(proxy::tls::build_acceptor)
        .transpose()?;

    let forwarding = proxy_config.forwarding_options();
    let engine = Arc::new(HttpForwarder::new(&forwarding, tls.is_some())?);

    let dashboard_file = match &proxy_config.dashboard_file {
        Some(path) => path.clone(),
        None => modules::config::default_dashboard_file()?,
    };

    let policy = OriginPolicy::new(
        proxy_config.origin_whitelist.iter().cloned(),
        proxy_config.origin_blacklist.iter().cloned(),
    );
    info!(
        "Origin policy: {} whitelisted, {} blacklisted",
        proxy_config.origin_whitelist.len(),
        proxy_config.origin_blacklist.len()
    );

    let dispatcher = Arc::new(GatewayDispatcher::new(
        Arc::new(policy),
        Arc::new(StatsRegistry::new()),
        dashboard_file,
        engine,
    ));

    AxumServer::start(
        proxy_config.get_bind_address(),
        proxy_config.port,
        dispatcher,
        tls,
    )
    .await
}

/// Load config, start the gateway and serve until Ctrl-C
pub async fn run() -> AppResult<()> {
    let config = modules::config::load_app_config()?;
    let _guard = modules::logger::init_logger(config.log_to_file);
    modules::config::write_default_config_if_missing(&config)?;

    let (server, handle) = start_gateway(&config).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    server.stop();
    handle.await.ok();
    Ok(())
}
