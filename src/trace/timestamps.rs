use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Raw instants observed while one request travelled over one connection.
///
/// Every field is optional: DNS is skipped for literal IP targets, and a
/// failed visit leaves everything after the failure point unset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TraceTimestamps {
    pub dns_start: Option<Instant>,
    pub dns_done: Option<Instant>,
    pub connect_start: Option<Instant>,
    pub connect_done: Option<Instant>,
    pub got_connection: Option<Instant>,
    pub first_response_byte: Option<Instant>,
    pub tls_handshake_start: Option<Instant>,
    pub tls_handshake_done: Option<Instant>,
}

impl TraceTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// The instant the visit is measured from: DNS start, or the TCP connect
    /// start when the target was already an address.
    pub fn origin(&self) -> Option<Instant> {
        self.dns_start.or(self.connect_start)
    }

    /// The instant name resolution is considered finished.
    pub fn resolved(&self) -> Option<Instant> {
        self.dns_done.or(self.connect_start)
    }

    pub fn dns_duration(&self) -> Option<Duration> {
        Some(self.resolved()?.checked_duration_since(self.origin()?)?)
    }

    /// Time spent on the TCP connect so far, up to `now` if it never finished.
    pub fn tcp_connect_duration(&self, now: Instant) -> Option<Duration> {
        let end = self.connect_done.unwrap_or(now);
        end.checked_duration_since(self.resolved()?)
    }

    /// The phase that was in progress given the milestones reached so far.
    pub fn pending_phase(&self) -> Phase {
        if self.origin().is_none() || self.resolved().is_none() {
            Phase::DnsLookup
        } else if self.connect_done.is_none() {
            Phase::TcpConnection
        } else if self.tls_handshake_start.is_some() && self.tls_handshake_done.is_none() {
            Phase::TlsHandshake
        } else if self.first_response_byte.is_none() {
            Phase::ServerProcessing
        } else {
            Phase::ContentTransfer
        }
    }
}

/// Partial report printed when the TCP connect fails.
impl fmt::Display for TraceTimestamps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = Instant::now();
        match self.dns_duration() {
            Some(dns) => writeln!(f, "     DNS Lookup: {:?}", dns)?,
            None => writeln!(f, "     DNS Lookup: N/A")?,
        }
        match self.tcp_connect_duration(now) {
            Some(tcp) => write!(f, " TCP Connection: {:?}", tcp),
            None => write!(f, " TCP Connection: N/A"),
        }
    }
}

/// A named, non-overlapping interval of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    DnsLookup,
    TcpConnection,
    TlsHandshake,
    ServerProcessing,
    ContentTransfer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::DnsLookup => "DNS lookup",
            Phase::TcpConnection => "TCP connection",
            Phase::TlsHandshake => "TLS handshake",
            Phase::ServerProcessing => "server processing",
            Phase::ContentTransfer => "content transfer",
        };
        f.write_str(name)
    }
}
