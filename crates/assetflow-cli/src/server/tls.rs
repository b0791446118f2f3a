//! HTTPS for the dev server.

use assetflow_core::config::HttpsConfig;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

/// Build a TLS acceptor from the configured PEM files.
pub fn load_acceptor(https: &HttpsConfig) -> Result<TlsAcceptor> {
    let certs = load_certs(&https.cert)?;
    let key = load_key(&https.key)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .into_diagnostic()?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .into_diagnostic()
        .wrap_err("Certificate and key do not form a usable pair")?;
    // Websocket upgrades need HTTP/1.1.
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<std::fs::File>> {
    let file = std::fs::File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()
        .wrap_err_with(|| format!("Invalid certificate PEM in {}", path.display()))?;
    if certs.is_empty() {
        return Err(miette!("No certificates found in {}", path.display()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .into_diagnostic()
        .wrap_err_with(|| format!("Invalid private key PEM in {}", path.display()))?
        .ok_or_else(|| miette!("No private key found in {}", path.display()))
}

/// Accept TLS connections and serve `app` on each one.
pub async fn serve(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.into_diagnostic()?;
        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());

        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%peer, error = %e, "TLS handshake failed");
                    return;
                }
            };
            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, error = %e, "Connection closed with error");
            }
        });
    }
}
