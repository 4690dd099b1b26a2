use crate::error::HttpstatError;
use crate::tls::verifier::HttpstatCertVerifier;
use pki_types::{CertificateDer, PrivateKeyDer};
use rustls::crypto::ring::{DEFAULT_CIPHER_SUITES, default_provider};
use rustls::{ClientConfig, RootCertStore};
use std::path::Path;
use std::sync::Arc;

/// Builds the TLS client configuration shared by every visit of one run.
///
/// TLS 1.2 and 1.3 only, webpki roots, `http/1.1` over ALPN.
pub fn build_client_config(
    insecure: bool,
    client_cert: Option<&Path>,
) -> Result<Arc<ClientConfig>, HttpstatError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::CryptoProvider {
        cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
        ..default_provider()
    });

    let verifier = HttpstatCertVerifier::new(insecure, provider.clone(), &root_store)?;

    let builder = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(rustls::DEFAULT_VERSIONS)
        .map_err(|e| HttpstatError::TlsConfig(e.to_string()))?
        .with_root_certificates(root_store);

    let mut tls_config = match client_cert {
        Some(path) => {
            let (certs, key) = read_client_cert(path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| {
                    HttpstatError::TlsConfig(format!(
                        "unable to load client cert and key pair from {}: {e}",
                        path.display()
                    ))
                })?
        }
        None => builder.with_no_client_auth(),
    };

    tls_config
        .dangerous()
        .set_certificate_verifier(Arc::new(verifier));
    tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(tls_config))
}

/// Reads a PEM file that carries both the client certificate chain and its
/// private key.
pub fn read_client_cert(
    path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), HttpstatError> {
    let cert_error = |source| HttpstatError::ClientCert {
        path: path.to_path_buf(),
        source,
    };
    let pem = std::fs::read(path).map_err(cert_error)?;

    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(cert_error)?;
    if certs.is_empty() {
        return Err(HttpstatError::TlsConfig(format!(
            "no certificate found in {}",
            path.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(cert_error)?
        .ok_or_else(|| {
            HttpstatError::TlsConfig(format!("no private key found in {}", path.display()))
        })?;

    Ok((certs, key))
}
