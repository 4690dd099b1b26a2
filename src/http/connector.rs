use crate::error::HttpstatError;
use crate::trace::ClientTrace;
use futures::future::BoxFuture;
use hyper::Uri;
use hyper_util::rt::TokioIo;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tower_service::Service;

/// Address family the connector is allowed to dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl IpFamily {
    pub fn admits(self, ip: &IpAddr) -> bool {
        match self {
            IpFamily::Any => true,
            IpFamily::V4 => ip.is_ipv4(),
            IpFamily::V6 => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::Any => f.write_str("IP"),
            IpFamily::V4 => f.write_str("IPv4"),
            IpFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Resolves and dials a destination while reporting every step to a
/// [`ClientTrace`].
///
/// Only the first address of the allowed family is dialed. A failed connect
/// ends the visit; there is no fallback to other addresses.
#[derive(Clone)]
pub struct TimedConnector {
    trace: Arc<dyn ClientTrace>,
    family: IpFamily,
}

impl TimedConnector {
    pub fn new(trace: Arc<dyn ClientTrace>, family: IpFamily) -> Self {
        Self { trace, family }
    }
}

impl Service<Uri> for TimedConnector {
    type Response = TokioIo<TcpStream>;
    type Error = HttpstatError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let trace = self.trace.clone();
        let family = self.family;

        Box::pin(async move {
            let host = dst
                .host()
                .ok_or_else(|| HttpstatError::MissingHost(dst.to_string()))?
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();
            let port = dst.port_u16().unwrap_or(match dst.scheme_str() {
                Some("https") => 443,
                _ => 80,
            });

            let (addr, dns) = resolve(&host, port, family, trace.as_ref()).await?;
            let stream = connect(addr, dns, trace.as_ref()).await?;
            Ok(TokioIo::new(stream))
        })
    }
}

async fn resolve(
    host: &str,
    port: u16,
    family: IpFamily,
    trace: &dyn ClientTrace,
) -> Result<(SocketAddr, Duration), HttpstatError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if !family.admits(&ip) {
            return Err(HttpstatError::NoAddress {
                host: host.to_string(),
                family,
            });
        }
        return Ok((SocketAddr::new(ip, port), Duration::ZERO));
    }

    debug!("Resolving DNS for: {host}");
    let started = Instant::now();
    trace.dns_start(host);

    let lookup = host.to_string();
    let resolved = tokio::task::spawn_blocking(move || {
        (lookup.as_str(), port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect::<Vec<_>>())
    })
    .await
    .map_err(io::Error::other)
    .and_then(|result| result);

    let addresses = match resolved {
        Ok(addresses) => addresses,
        Err(source) => {
            trace.dns_done(&[]);
            return Err(HttpstatError::Dns {
                host: host.to_string(),
                source,
            });
        }
    };
    trace.dns_done(&addresses);
    let elapsed = started.elapsed();

    for (i, addr) in addresses.iter().enumerate() {
        if i == 0 {
            debug!("Resolved IP: {}", addr.ip());
        } else {
            debug!("Resolved IP (alternative): {}", addr.ip());
        }
    }

    addresses
        .into_iter()
        .find(|addr| family.admits(&addr.ip()))
        .map(|addr| (addr, elapsed))
        .ok_or_else(|| HttpstatError::NoAddress {
            host: host.to_string(),
            family,
        })
}

async fn connect(
    addr: SocketAddr,
    dns: Duration,
    trace: &dyn ClientTrace,
) -> Result<TcpStream, HttpstatError> {
    let started = Instant::now();
    trace.connect_start(addr);
    match TcpStream::connect(addr).await {
        Ok(stream) => {
            trace.connect_done(addr, Ok(()));
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Failed to set TCP_NODELAY on {addr}: {e}");
            }
            Ok(stream)
        }
        Err(source) => {
            trace.connect_done(addr, Err(&source));
            Err(HttpstatError::Connect {
                addr,
                dns,
                tcp: started.elapsed(),
                source,
            })
        }
    }
}
