use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Env var that disables upstream certificate verification when set to "0"
pub const TLS_REJECT_UNAUTHORIZED_ENV: &str = "CORSGATE_TLS_REJECT_UNAUTHORIZED";

/// Gateway service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Whether LAN access is allowed
    /// - false: loopback only, 127.0.0.1 (default)
    /// - true: all interfaces, 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed through. Empty means no whitelist restriction, "*" admits everyone
    #[serde(default)]
    pub origin_whitelist: Vec<String>,

    /// Origins rejected with 403
    #[serde(default)]
    pub origin_blacklist: Vec<String>,

    /// Static asset served on /proxy. Defaults to proxy.html in the data directory
    #[serde(default)]
    pub dashboard_file: Option<PathBuf>,

    /// Serve HTTPS when present
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Overrides applied on top of the forwarding engine defaults
    #[serde(default)]
    pub forwarding: ForwardingOverrides,
}

/// Certificate chain and private key for the HTTPS listener (PEM files)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Upstream proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpstreamProxyConfig {
    /// Enabled or not
    pub enabled: bool,
    /// Proxy address (http://, https://, socks5://)
    pub url: String,
}

/// Effective options handed to the forwarding engine
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardingOptions {
    /// Append X-Forwarded-* headers
    pub xfwd: bool,
    /// Verify upstream TLS certificates
    pub secure: bool,
    /// Fixed upstream base URL. When absent the target is taken from the request path
    pub target: Option<String>,
    /// Upstream request timeout (seconds)
    pub timeout_secs: u64,
    pub upstream_proxy: UpstreamProxyConfig,
}

impl Default for ForwardingOptions {
    fn default() -> Self {
        let secure = std::env::var(TLS_REJECT_UNAUTHORIZED_ENV)
            .map(|v| v != "0")
            .unwrap_or(true);
        Self {
            xfwd: true,
            secure,
            target: None,
            timeout_secs: default_request_timeout(),
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

/// Optional per-field overrides for [`ForwardingOptions`]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ForwardingOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xfwd: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_proxy: Option<UpstreamProxyConfig>,
}

impl ForwardingOverrides {
    /// Apply every field that is set on top of `base`
    pub fn apply(&self, mut base: ForwardingOptions) -> ForwardingOptions {
        if let Some(xfwd) = self.xfwd {
            base.xfwd = xfwd;
        }
        if let Some(secure) = self.secure {
            base.secure = secure;
        }
        if let Some(target) = &self.target {
            base.target = Some(target.clone());
        }
        if let Some(timeout) = self.timeout_secs {
            base.timeout_secs = timeout;
        }
        if let Some(proxy) = &self.upstream_proxy {
            base.upstream_proxy = proxy.clone();
        }
        base
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allow_lan_access: false,
            port: default_port(),
            origin_whitelist: Vec::new(),
            origin_blacklist: Vec::new(),
            dashboard_file: None,
            tls: None,
            forwarding: ForwardingOverrides::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    120
}

impl ProxyConfig {
    /// Get the actual listening address
    /// - allow_lan_access = false: "127.0.0.1"
    /// - allow_lan_access = true: "0.0.0.0"
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Forwarding defaults merged with the configured overrides
    pub fn forwarding_options(&self) -> ForwardingOptions {
        self.forwarding.apply(ForwardingOptions::default())
    }
}
