//! Error taxonomy of a timed exchange.
//!
//! Every variant is fatal for the whole invocation: there is no retry and no
//! partial-result mode. A redirect without a `Location` header is not an
//! error and has no variant here.

use crate::http::connector::IpFamily;
use crate::timeline::TimelineError;
use crate::trace::Phase;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpstatError {
    #[error("DNS lookup failed for {host}: {source}")]
    Dns { host: String, source: io::Error },

    #[error("DNS lookup for {host} returned no {family} addresses")]
    NoAddress { host: String, family: IpFamily },

    #[error(
        "TCP connection to {addr} failed after {}ms (DNS lookup {}ms): {source}",
        .tcp.as_millis(),
        .dns.as_millis()
    )]
    Connect {
        addr: SocketAddr,
        dns: Duration,
        tcp: Duration,
        source: io::Error,
    },

    #[error("TLS handshake with {server_name} failed: {source}")]
    Tls { server_name: String, source: io::Error },

    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("failed to read client certificate file {}: {source}", .path.display())]
    ClientCert { path: PathBuf, source: io::Error },

    #[error("proxy tunnel through {proxy} failed: {source}")]
    Proxy { proxy: String, source: BoxError },

    #[error("request timed out after {}s during {phase}", .timeout.as_secs())]
    Timeout { timeout: Duration, phase: Phase },

    #[error("failed to read response during {phase}: {source}")]
    Http { phase: Phase, source: hyper::Error },

    #[error("unable to create request: {0}")]
    Request(#[from] http::Error),

    #[error("unsupported URL scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("URL {0} has no host")]
    MissingHost(String),

    #[error("maximum number of redirects ({max}) followed")]
    TooManyRedirects { max: usize },

    #[error("unable to follow redirect to {location:?}: {reason}")]
    InvalidRedirect { location: String, reason: String },

    #[error("{context}: {source}")]
    BodyIo { context: String, source: io::Error },

    #[error("No remote filename; specify output filename with -o to save response body")]
    NoRemoteFilename,

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

impl HttpstatError {
    pub fn body_io(context: impl Into<String>, source: io::Error) -> Self {
        HttpstatError::BodyIo {
            context: context.into(),
            source,
        }
    }
}
