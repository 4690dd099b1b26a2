use crate::trace::timestamps::TraceTimestamps;
use colored::Colorize;
use std::io;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;

/// Hooks the transport invokes at each point of a connection's lifecycle.
///
/// Implementations must only observe: they never alter the connection and
/// must not block.
pub trait ClientTrace: Send + Sync {
    fn dns_start(&self, host: &str);
    fn dns_done(&self, addrs: &[SocketAddr]);
    fn connect_start(&self, addr: SocketAddr);
    fn connect_done(&self, addr: SocketAddr, result: Result<(), &io::Error>);
    fn got_connection(&self);
    fn got_first_response_byte(&self);
    fn tls_handshake_start(&self);
    fn tls_handshake_done(&self, result: Result<(), &io::Error>);
}

/// Records one instant per lifecycle event of a single visit.
///
/// Each slot is written at most once; later writes to a filled slot are
/// ignored, so the first observation always wins.
#[derive(Debug, Default)]
pub struct TraceCollector {
    /// Print the `Connected to` notice and the partial report on stdout.
    announce: bool,
    dns_start: OnceLock<Instant>,
    dns_done: OnceLock<Instant>,
    connect_start: OnceLock<Instant>,
    connect_done: OnceLock<Instant>,
    got_connection: OnceLock<Instant>,
    first_response_byte: OnceLock<Instant>,
    tls_handshake_start: OnceLock<Instant>,
    tls_handshake_done: OnceLock<Instant>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self {
            announce: true,
            ..Default::default()
        }
    }

    /// A collector that keeps stdout clean, for machine readable output.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TraceTimestamps {
        TraceTimestamps {
            dns_start: self.dns_start.get().copied(),
            dns_done: self.dns_done.get().copied(),
            connect_start: self.connect_start.get().copied(),
            connect_done: self.connect_done.get().copied(),
            got_connection: self.got_connection.get().copied(),
            first_response_byte: self.first_response_byte.get().copied(),
            tls_handshake_start: self.tls_handshake_start.get().copied(),
            tls_handshake_done: self.tls_handshake_done.get().copied(),
        }
    }
}

fn record(slot: &OnceLock<Instant>) {
    let _ = slot.set(Instant::now());
}

impl ClientTrace for TraceCollector {
    fn dns_start(&self, host: &str) {
        trace!("DNS lookup started for {host}");
        record(&self.dns_start);
    }

    fn dns_done(&self, addrs: &[SocketAddr]) {
        trace!("DNS lookup finished: {addrs:?}");
        record(&self.dns_done);
    }

    fn connect_start(&self, addr: SocketAddr) {
        trace!("Connecting to {addr}");
        // Without a DNS phase the connect start is the only lower bound
        // for the TCP phase.
        if self.dns_done.get().is_none() {
            record(&self.connect_start);
        }
    }

    fn connect_done(&self, addr: SocketAddr, result: Result<(), &io::Error>) {
        match result {
            Ok(()) => {
                record(&self.connect_done);
                if self.announce {
                    println!("\n{}{}", "Connected to ".green(), addr.to_string().cyan());
                } else {
                    debug!("Connected to {addr}");
                }
            }
            Err(e) => {
                if self.announce {
                    println!("{}", self.snapshot());
                } else {
                    eprintln!("{}", self.snapshot());
                }
                error!("unable to connect to host {addr}: {e}");
            }
        }
    }

    fn got_connection(&self) {
        record(&self.got_connection);
    }

    fn got_first_response_byte(&self) {
        record(&self.first_response_byte);
    }

    fn tls_handshake_start(&self) {
        record(&self.tls_handshake_start);
    }

    fn tls_handshake_done(&self, result: Result<(), &io::Error>) {
        if let Err(e) = result {
            debug!("TLS handshake failed: {e}");
        }
        record(&self.tls_handshake_done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 80)
    }

    #[test]
    fn test_connect_start_ignored_after_dns() {
        let collector = TraceCollector::new();
        collector.dns_start("example.com");
        collector.dns_done(&[addr()]);
        collector.connect_start(addr());

        let ts = collector.snapshot();
        assert!(ts.dns_start.is_some());
        assert!(ts.dns_done.is_some());
        assert_eq!(ts.connect_start, None);
    }

    #[test]
    fn test_connect_start_recorded_without_dns() {
        let collector = TraceCollector::new();
        collector.connect_start(addr());
        collector.connect_done(addr(), Ok(()));

        let ts = collector.snapshot();
        assert_eq!(ts.dns_start, None);
        assert!(ts.connect_start.is_some());
        assert!(ts.connect_done >= ts.connect_start);
    }

    #[test]
    fn test_failed_connect_leaves_connect_done_unset() {
        let collector = TraceCollector::new();
        collector.connect_start(addr());
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        collector.connect_done(addr(), Err(&err));

        assert_eq!(collector.snapshot().connect_done, None);
    }

    #[test]
    fn test_first_observation_wins() {
        let collector = TraceCollector::new();
        collector.got_first_response_byte();
        let first = collector.snapshot().first_response_byte;
        std::thread::sleep(std::time::Duration::from_millis(2));
        collector.got_first_response_byte();

        assert_eq!(collector.snapshot().first_response_byte, first);
    }
}
