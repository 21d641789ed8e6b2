// HTTPS listener support

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::{AppError, AppResult};
use crate::proxy::config::TlsConfig;

/// Build the acceptor used to wrap every accepted TCP stream
pub fn build_acceptor(config: &TlsConfig) -> AppResult<TlsAcceptor> {
    let certs = load_certs(&config.cert_file)?;
    let key = load_private_key(&config.key_file)?;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| AppError::Tls(format!("Invalid certificate/key pair: {}", e)))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &Path) -> AppResult<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| {
        AppError::Tls(format!("Failed to open certificate file {:?}: {}", path, e))
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Tls(format!("Failed to parse certificates: {}", e)))?;

    if certs.is_empty() {
        return Err(AppError::Tls(format!("No certificates found in {:?}", path)));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> AppResult<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| AppError::Tls(format!("Failed to open key file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| AppError::Tls(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| AppError::Tls(format!("No valid private key found in {:?}", path)))
}
