//! Converts the raw instants of a visit into named phases and cumulative
//! markers.
//!
//! The computation is pure. Milestones that are out of order produce a
//! [`TimelineError`] instead of being clamped, so clock problems surface
//! rather than hide behind zero-length phases.

use crate::trace::{Phase, TraceTimestamps};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Whether the visit negotiated TLS on top of TCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_url(url: &url::Url) -> Option<Self> {
        match url.scheme() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("timeline is missing the {0} milestone")]
    MissingMilestone(&'static str),
    #[error("milestone {later} was observed before {earlier}")]
    OutOfOrder {
        earlier: &'static str,
        later: &'static str,
    },
}

/// Phase durations and cumulative markers of one visit.
///
/// Markers are measured from the start of DNS resolution, or from the TCP
/// connect start when DNS was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTimeline {
    pub scheme: Scheme,
    #[serde(serialize_with = "millis")]
    pub dns_lookup: Duration,
    #[serde(serialize_with = "millis")]
    pub tcp_connection: Duration,
    #[serde(serialize_with = "optional_millis")]
    pub tls_handshake: Option<Duration>,
    #[serde(serialize_with = "millis")]
    pub server_processing: Duration,
    #[serde(serialize_with = "millis")]
    pub content_transfer: Duration,
    #[serde(serialize_with = "millis")]
    pub namelookup: Duration,
    #[serde(serialize_with = "millis")]
    pub connect: Duration,
    #[serde(serialize_with = "millis")]
    pub pretransfer: Duration,
    #[serde(serialize_with = "millis")]
    pub starttransfer: Duration,
    #[serde(serialize_with = "millis")]
    pub total: Duration,
}

struct Milestone {
    at: Instant,
    name: &'static str,
}

fn milestone(at: Option<Instant>, name: &'static str) -> Result<Milestone, TimelineError> {
    at.map(|at| Milestone { at, name })
        .ok_or(TimelineError::MissingMilestone(name))
}

fn span(from: &Milestone, to: &Milestone) -> Result<Duration, TimelineError> {
    to.at
        .checked_duration_since(from.at)
        .ok_or(TimelineError::OutOfOrder {
            earlier: from.name,
            later: to.name,
        })
}

impl PhaseTimeline {
    /// Builds the timeline from the trace of one visit, where `end` is the
    /// moment the response body was fully consumed.
    pub fn compute(
        ts: &TraceTimestamps,
        scheme: Scheme,
        end: Instant,
    ) -> Result<Self, TimelineError> {
        let origin = milestone(ts.origin(), "dns start")?;
        let resolved = milestone(ts.resolved(), "dns done")?;
        let got_connection = milestone(ts.got_connection, "got connection")?;
        let first_byte = milestone(ts.first_response_byte, "first response byte")?;
        let end = Milestone {
            at: end,
            name: "body consumed",
        };

        let dns_lookup = span(&origin, &resolved)?;
        let server_processing = span(&got_connection, &first_byte)?;
        let content_transfer = span(&first_byte, &end)?;

        let (tcp_connection, tls_handshake, connect) = match scheme {
            Scheme::Https => {
                let connect_done = milestone(ts.connect_done, "connect done")?;
                let tls_start = milestone(ts.tls_handshake_start, "tls handshake start")?;
                let tls_done = milestone(ts.tls_handshake_done, "tls handshake done")?;
                span(&connect_done, &tls_start)?;
                span(&tls_done, &got_connection)?;
                (
                    span(&resolved, &tls_start)?,
                    Some(span(&tls_start, &tls_done)?),
                    span(&origin, &connect_done)?,
                )
            }
            Scheme::Http => (
                span(&resolved, &got_connection)?,
                None,
                span(&origin, &got_connection)?,
            ),
        };

        Ok(Self {
            scheme,
            dns_lookup,
            tcp_connection,
            tls_handshake,
            server_processing,
            content_transfer,
            namelookup: dns_lookup,
            connect,
            pretransfer: span(&origin, &got_connection)?,
            starttransfer: span(&origin, &first_byte)?,
            total: span(&origin, &end)?,
        })
    }

    /// Block phases in the order they happen.
    pub fn phases(&self) -> Vec<(Phase, Duration)> {
        let mut phases = vec![
            (Phase::DnsLookup, self.dns_lookup),
            (Phase::TcpConnection, self.tcp_connection),
        ];
        if let Some(tls) = self.tls_handshake {
            phases.push((Phase::TlsHandshake, tls));
        }
        phases.push((Phase::ServerProcessing, self.server_processing));
        phases.push((Phase::ContentTransfer, self.content_transfer));
        phases
    }

    /// Cumulative markers in source order.
    pub fn markers(&self) -> [(&'static str, Duration); 5] {
        [
            ("namelookup", self.namelookup),
            ("connect", self.connect),
            ("pretransfer", self.pretransfer),
            ("starttransfer", self.starttransfer),
            ("total", self.total),
        ]
    }
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

fn optional_millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_millis()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn https_trace(t0: Instant) -> TraceTimestamps {
        TraceTimestamps {
            dns_start: Some(t0),
            dns_done: Some(t0 + ms(5)),
            connect_start: None,
            connect_done: Some(t0 + ms(20)),
            tls_handshake_start: Some(t0 + ms(20)),
            tls_handshake_done: Some(t0 + ms(60)),
            got_connection: Some(t0 + ms(61)),
            first_response_byte: Some(t0 + ms(100)),
        }
    }

    fn http_trace(t0: Instant) -> TraceTimestamps {
        TraceTimestamps {
            dns_start: Some(t0),
            dns_done: Some(t0 + ms(5)),
            connect_done: Some(t0 + ms(20)),
            got_connection: Some(t0 + ms(21)),
            first_response_byte: Some(t0 + ms(40)),
            ..Default::default()
        }
    }

    fn assert_markers_non_decreasing(timeline: &PhaseTimeline) {
        let markers = timeline.markers();
        for pair in markers.windows(2) {
            assert!(
                pair[0].1 <= pair[1].1,
                "{} ({:?}) is after {} ({:?})",
                pair[0].0,
                pair[0].1,
                pair[1].0,
                pair[1].1
            );
        }
    }

    #[test]
    fn test_https_timeline_phases() {
        let t0 = Instant::now();
        let timeline = PhaseTimeline::compute(&https_trace(t0), Scheme::Https, t0 + ms(130))
            .expect("well ordered trace");

        assert_eq!(timeline.dns_lookup, ms(5));
        assert_eq!(timeline.tcp_connection, ms(15));
        assert_eq!(timeline.tls_handshake, Some(ms(40)));
        assert_eq!(timeline.server_processing, ms(39));
        assert_eq!(timeline.content_transfer, ms(30));

        assert_eq!(timeline.namelookup, ms(5));
        assert_eq!(timeline.connect, ms(20));
        assert_eq!(timeline.pretransfer, ms(61));
        assert_eq!(timeline.starttransfer, ms(100));
        assert_eq!(timeline.total, ms(130));
        assert_markers_non_decreasing(&timeline);
    }

    #[test]
    fn test_http_timeline_has_no_tls_phase() {
        let t0 = Instant::now();
        let timeline = PhaseTimeline::compute(&http_trace(t0), Scheme::Http, t0 + ms(55))
            .expect("well ordered trace");

        assert_eq!(timeline.tls_handshake, None);
        assert!(!timeline
            .phases()
            .iter()
            .any(|(phase, _)| *phase == Phase::TlsHandshake));
        assert_eq!(timeline.tcp_connection, ms(16));
        assert_eq!(timeline.connect, ms(21));
        assert_eq!(timeline.server_processing, ms(19));
        assert_eq!(timeline.content_transfer, ms(15));
        assert_eq!(timeline.total, ms(55));
        assert_markers_non_decreasing(&timeline);
    }

    #[test]
    fn test_https_timeline_includes_tls_phase() {
        let t0 = Instant::now();
        let timeline =
            PhaseTimeline::compute(&https_trace(t0), Scheme::Https, t0 + ms(100)).unwrap();
        let phases: Vec<Phase> = timeline.phases().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            phases,
            vec![
                Phase::DnsLookup,
                Phase::TcpConnection,
                Phase::TlsHandshake,
                Phase::ServerProcessing,
                Phase::ContentTransfer,
            ]
        );
    }

    #[test]
    fn test_skipped_dns_uses_connect_start_as_origin() {
        let t0 = Instant::now();
        let ts = TraceTimestamps {
            connect_start: Some(t0),
            connect_done: Some(t0 + ms(2)),
            got_connection: Some(t0 + ms(3)),
            first_response_byte: Some(t0 + ms(9)),
            ..Default::default()
        };
        let timeline = PhaseTimeline::compute(&ts, Scheme::Http, t0 + ms(10)).unwrap();

        assert_eq!(timeline.dns_lookup, Duration::ZERO);
        assert_eq!(timeline.namelookup, Duration::ZERO);
        assert_eq!(timeline.tcp_connection, ms(3));
        assert_eq!(timeline.total, ms(10));
        assert_markers_non_decreasing(&timeline);
    }

    #[test]
    fn test_phases_add_up_to_total() {
        let t0 = Instant::now();
        for (ts, scheme) in [
            (https_trace(t0), Scheme::Https),
            (http_trace(t0), Scheme::Http),
        ] {
            let timeline = PhaseTimeline::compute(&ts, scheme, t0 + ms(200)).unwrap();
            let sum: Duration = timeline.phases().iter().map(|(_, d)| *d).sum();
            // TLS: the gap between handshake done and got connection is not a phase.
            assert!(sum <= timeline.total);
            assert!(timeline.total - sum <= ms(1));
        }
    }

    #[test]
    fn test_out_of_order_milestones_are_reported() {
        let t0 = Instant::now();
        let mut ts = http_trace(t0);
        ts.first_response_byte = Some(t0 + ms(10));
        ts.got_connection = Some(t0 + ms(30));

        let err = PhaseTimeline::compute(&ts, Scheme::Http, t0 + ms(50)).unwrap_err();
        assert_eq!(
            err,
            TimelineError::OutOfOrder {
                earlier: "got connection",
                later: "first response byte",
            }
        );
    }

    #[test]
    fn test_missing_tls_milestones_are_reported() {
        let t0 = Instant::now();
        let err = PhaseTimeline::compute(&http_trace(t0), Scheme::Https, t0 + ms(50)).unwrap_err();
        assert_eq!(err, TimelineError::MissingMilestone("tls handshake start"));
    }

    #[test]
    fn test_end_before_first_byte_is_reported() {
        let t0 = Instant::now();
        let err = PhaseTimeline::compute(&http_trace(t0), Scheme::Http, t0 + ms(30)).unwrap_err();
        assert!(matches!(err, TimelineError::OutOfOrder { later: "body consumed", .. }));
    }
}
