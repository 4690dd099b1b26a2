use crate::error::HttpstatError;
use pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::DigitallySignedStruct;
use rustls::Error;
use rustls::RootCertStore;
use rustls::SignatureScheme;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use std::sync::Arc;
use tracing::Level;
use x509_parser::parse_x509_certificate;

/// WebPKI verification that logs the presented certificate and can be told
/// to accept any certificate (`-k`).
#[derive(Debug)]
pub struct HttpstatCertVerifier {
    verifier: Arc<dyn ServerCertVerifier>,
    insecure: bool,
}

impl HttpstatCertVerifier {
    pub fn new(
        insecure: bool,
        provider: Arc<CryptoProvider>,
        root_store: &RootCertStore,
    ) -> Result<Self, HttpstatError> {
        let verifier = rustls::client::WebPkiServerVerifier::builder_with_provider(
            root_store.clone().into(),
            provider,
        )
        .build()
        .map_err(|e| HttpstatError::TlsConfig(e.to_string()))?;

        Ok(Self { verifier, insecure })
    }
}

fn log_certificate(end_entity: &CertificateDer<'_>) {
    match parse_x509_certificate(end_entity.as_ref()) {
        Ok((_, cert)) => {
            debug!("Server certificate:");
            debug!("  Subject: {}", cert.subject());
            debug!("  Issuer: {}", cert.issuer());
            debug!(
                "  Validity: {} - {}",
                cert.validity().not_before,
                cert.validity().not_after
            );
            if let Ok(Some(san)) = cert.tbs_certificate.subject_alternative_name() {
                debug!("  Subject Alternative Names:");
                for name in &san.value.general_names {
                    debug!("    - {}", name);
                }
            }
        }
        Err(e) => debug!("Failed to parse server certificate: {e}"),
    }
}

impl ServerCertVerifier for HttpstatCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        if tracing::enabled!(Level::DEBUG) {
            log_certificate(end_entity);
        }

        if self.insecure {
            Ok(ServerCertVerified::assertion())
        } else {
            self.verifier
                .verify_server_cert(end_entity, intermediates, server_name, ocsp, now)
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.verifier.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.verifier.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.verifier.supported_verify_schemes()
    }
}
