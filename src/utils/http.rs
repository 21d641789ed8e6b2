use reqwest::{Client, Proxy};

use crate::proxy::config::ForwardingOptions;

/// Create the upstream HTTP client from the effective forwarding options
pub fn create_client(options: &ForwardingOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(std::time::Duration::from_secs(options.timeout_secs))
        .danger_accept_invalid_certs(!options.secure)
        .redirect(reqwest::redirect::Policy::none());

    let proxy_config = &options.upstream_proxy;
    if proxy_config.enabled && !proxy_config.url.is_empty() {
        match Proxy::all(&proxy_config.url) {
            Ok(proxy) => {
                builder = builder.proxy(proxy);
                tracing::info!("HTTP client upstream proxy enabled: {}", proxy_config.url);
            }
            Err(e) => {
                tracing::error!("Invalid proxy address: {}, error: {}", proxy_config.url, e);
            }
        }
    } else {
        // Only the configured upstream proxy is used, never HTTP(S)_PROXY from the environment
        builder = builder.no_proxy();
    }

    if !options.secure {
        tracing::warn!("Upstream TLS certificate verification is disabled");
    }

    builder.build()
}
