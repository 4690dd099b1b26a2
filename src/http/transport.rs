use crate::error::HttpstatError;
use crate::http::connector::{IpFamily, TimedConnector};
use crate::http::proxy::ProxyPolicy;
use crate::http::request::{ExchangeRequest, RequestBody};
use crate::timeline::Scheme;
use crate::tls::TlsVersion;
use crate::tls::config::build_client_config;
use crate::trace::{ClientTrace, FirstByteStream, Phase};
use hyper::client::conn::http1;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::rt::TokioIo;
use pki_types::ServerName;
use rustls::ClientConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tower_service::Service;
use tracing::Instrument;

/// Transport settings supplied by the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPolicy {
    pub insecure: bool,
    pub client_cert: Option<PathBuf>,
    pub family: IpFamily,
    /// Bound on the whole exchange; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            insecure: false,
            client_cert: None,
            family: IpFamily::Any,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Everything needed to open connections, built once per invocation and
/// shared read-only by every visit.
///
/// Connections are never pooled: each visit dials, and optionally
/// handshakes, from scratch.
pub struct Transport {
    tls: Arc<ClientConfig>,
    proxy: ProxyPolicy,
    family: IpFamily,
    timeout: Option<Duration>,
}

/// A connection ready to carry exactly one request.
pub(crate) struct Connection {
    pub sender: http1::SendRequest<RequestBody>,
    pub tls_version: TlsVersion,
    /// Requests go to a forward proxy and need an absolute-form target.
    pub absolute_form: bool,
}

impl Transport {
    pub fn new(policy: &TransportPolicy, proxy: ProxyPolicy) -> Result<Self, HttpstatError> {
        let tls = build_client_config(policy.insecure, policy.client_cert.as_deref())?;
        Ok(Self {
            tls,
            proxy,
            family: policy.family,
            timeout: policy.timeout,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) async fn connect(
        &self,
        request: &ExchangeRequest,
        scheme: Scheme,
        trace: Arc<dyn ClientTrace>,
    ) -> Result<Connection, HttpstatError> {
        let mut connector = TimedConnector::new(trace.clone(), self.family);
        let origin = request.origin_uri()?;
        let proxy = self.proxy.proxy_for(&request.target).cloned();

        match (scheme, proxy) {
            (Scheme::Http, None) => {
                let io = connector.call(origin).await?;
                let sender = handshake(io.into_inner(), trace).await?;
                Ok(Connection {
                    sender,
                    tls_version: TlsVersion::None,
                    absolute_form: false,
                })
            }
            (Scheme::Http, Some(proxy)) => {
                info!("Using HTTP proxy: {proxy}");
                let io = connector.call(proxy).await?;
                let sender = handshake(io.into_inner(), trace).await?;
                Ok(Connection {
                    sender,
                    tls_version: TlsVersion::None,
                    absolute_form: true,
                })
            }
            (Scheme::Https, None) => {
                let io = connector.call(origin).await?;
                self.connect_tls(io.into_inner(), request, trace).await
            }
            (Scheme::Https, Some(proxy)) => {
                info!("Using HTTPS proxy: {proxy}");
                let mut tunnel = Tunnel::new(proxy.clone(), connector);
                let io = tunnel
                    .call(origin)
                    .await
                    .map_err(|e| HttpstatError::Proxy {
                        proxy: proxy.to_string(),
                        source: e.into(),
                    })?;
                self.connect_tls(io.into_inner(), request, trace).await
            }
        }
    }

    async fn connect_tls(
        &self,
        stream: TcpStream,
        request: &ExchangeRequest,
        trace: Arc<dyn ClientTrace>,
    ) -> Result<Connection, HttpstatError> {
        let name = request.server_name()?;
        let server_name = ServerName::try_from(name.clone())
            .map_err(|_| HttpstatError::InvalidServerName(name.clone()))?;
        let connector = TlsConnector::from(self.tls.clone());

        trace.tls_handshake_start();
        let result = connector.connect(server_name, stream).await;
        trace.tls_handshake_done(result.as_ref().map(|_| ()));
        let tls_stream = result.map_err(|source| HttpstatError::Tls {
            server_name: name,
            source,
        })?;

        let tls_version = TlsVersion::from(tls_stream.get_ref().1.protocol_version());
        debug!("TLS handshake complete: {tls_version}");
        let sender = handshake(tls_stream, trace).await?;
        Ok(Connection {
            sender,
            tls_version,
            absolute_form: false,
        })
    }
}

/// Sets up HTTP/1.1 on an established stream and drives the connection on a
/// background task.
async fn handshake<S>(
    stream: S,
    trace: Arc<dyn ClientTrace>,
) -> Result<http1::SendRequest<RequestBody>, HttpstatError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(FirstByteStream::new(stream, trace.clone()));
    let (sender, conn) = http1::handshake(io)
        .instrument(info_span!("Http Handshake"))
        .await
        .map_err(|source| HttpstatError::Http {
            phase: Phase::TcpConnection,
            source,
        })?;

    tokio::task::spawn(
        async move {
            if let Err(err) = conn.await {
                debug!("Connection closed with error: {err:?}");
            }
        }
        .instrument(info_span!("httpstat connection").or_current()),
    );

    trace.got_connection();
    Ok(sender)
}
