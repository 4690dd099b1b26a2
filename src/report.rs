//! Terminal and JSON rendering of a visit.

use crate::http::handler::Visit;
use crate::http::headers::display_headers;
use crate::timeline::{PhaseTimeline, Scheme};
use crate::tls::TlsVersion;
use colored::{ColoredString, Colorize};
use http::Version;
use serde::Serialize;
use std::time::Duration;

fn grey(s: &str) -> ColoredString {
    s.truecolor(148, 148, 148)
}

fn light_grey(s: &str) -> ColoredString {
    s.truecolor(168, 168, 168)
}

fn block(d: Duration) -> ColoredString {
    format!("{:>7}ms", d.as_millis()).cyan()
}

fn flag(d: Duration) -> ColoredString {
    format!("{:<9}", format!("{}ms", d.as_millis())).cyan()
}

fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "?",
    }
}

/// Everything printed for a visit after the `Connected to` notice.
pub fn render_visit(visit: &Visit) -> String {
    let outcome = &visit.outcome;
    let mut out = String::new();

    out.push_str(&format!(
        "\n{} {}\n",
        "Connected via".green(),
        outcome.tls_version.to_string().cyan()
    ));

    let status = match outcome.status.canonical_reason() {
        Some(reason) => format!("{} {}", outcome.status.as_u16(), reason),
        None => outcome.status.as_u16().to_string(),
    };
    out.push_str(&format!(
        "\n{}{}{}\n",
        "HTTP".green(),
        grey("/"),
        format!("{} {}", protocol(outcome.version), status).cyan()
    ));
    for (name, value) in display_headers(&outcome.headers) {
        out.push_str(&format!("{} {}\n", grey(&format!("{name}:")), value.cyan()));
    }

    if !outcome.body_message.is_empty() {
        out.push_str(&format!("\n{}\n", outcome.body_message.cyan()));
    }

    out.push('\n');
    out.push_str(&render_timeline(&visit.timeline));
    out
}

/// The phase diagram with block durations and cumulative markers.
pub fn render_timeline(t: &PhaseTimeline) -> String {
    match (t.scheme, t.tls_handshake) {
        (Scheme::Https, Some(tls)) => format!(
            "{}\n\
             [{}  ┃     {}  ┃    {}  ┃        {}  ┃       {}  ]\n\
             \x20           ┃                ┃               ┃                   ┃                  ┃\n\
             \x20 namelookup:{}       ┃               ┃                   ┃                  ┃\n\
             \x20                     connect:{}      ┃                   ┃                  ┃\n\
             \x20                                 pretransfer:{}          ┃                  ┃\n\
             \x20                                                   starttransfer:{}         ┃\n\
             \x20                                                                              total:{}\n",
            light_grey(
                "  DNS Lookup   TCP Connection   TLS Handshake   Server Processing   Content Transfer"
            ),
            block(t.dns_lookup),
            block(t.tcp_connection),
            block(tls),
            block(t.server_processing),
            block(t.content_transfer),
            flag(t.namelookup),
            flag(t.connect),
            flag(t.pretransfer),
            flag(t.starttransfer),
            flag(t.total),
        ),
        _ => format!(
            "{}\n\
             [ {}  ┃     {}  ┃        {}  ┃       {}  ]\n\
             \x20            ┃                ┃                   ┃                  ┃\n\
             \x20  namelookup:{}       ┃                   ┃                  ┃\n\
             \x20                      connect:{}          ┃                  ┃\n\
             \x20                                    starttransfer:{}         ┃\n\
             \x20                                                               total:{}\n",
            light_grey("   DNS Lookup   TCP Connection   Server Processing   Content Transfer"),
            block(t.dns_lookup),
            block(t.tcp_connection),
            block(t.server_processing),
            block(t.content_transfer),
            flag(t.namelookup),
            flag(t.connect),
            flag(t.starttransfer),
            flag(t.total),
        ),
    }
}

pub fn print_visit(visit: &Visit) {
    print!("{}", render_visit(visit));
}

#[derive(Debug, Serialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Machine readable form of one visit.
#[derive(Debug, Serialize)]
pub struct VisitReport<'a> {
    pub url: &'a str,
    pub status: u16,
    pub reason: Option<&'static str>,
    pub version: &'static str,
    pub tls_version: TlsVersion,
    pub headers: Vec<HeaderEntry>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub body: &'a str,
    pub timeline: &'a PhaseTimeline,
}

impl<'a> From<&'a Visit> for VisitReport<'a> {
    fn from(visit: &'a Visit) -> Self {
        let outcome = &visit.outcome;
        VisitReport {
            url: outcome.url.as_str(),
            status: outcome.status.as_u16(),
            reason: outcome.status.canonical_reason(),
            version: protocol(outcome.version),
            tls_version: outcome.tls_version,
            headers: display_headers(&outcome.headers)
                .into_iter()
                .map(|(name, value)| HeaderEntry { name, value })
                .collect(),
            body: &outcome.body_message,
            timeline: &visit.timeline,
        }
    }
}

pub fn print_json(visit: &Visit) {
    match serde_json::to_string(&VisitReport::from(visit)) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("unable to serialize visit report: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::ExchangeOutcome;
    use crate::trace::TraceTimestamps;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::time::Instant;
    use url::Url;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn visit(scheme: Scheme) -> Visit {
        let t0 = Instant::now();
        let mut ts = TraceTimestamps {
            dns_start: Some(t0),
            dns_done: Some(t0 + ms(5)),
            connect_done: Some(t0 + ms(20)),
            ..Default::default()
        };
        let end = match scheme {
            Scheme::Https => {
                ts.tls_handshake_start = Some(t0 + ms(20));
                ts.tls_handshake_done = Some(t0 + ms(60));
                ts.got_connection = Some(t0 + ms(60));
                ts.first_response_byte = Some(t0 + ms(160));
                t0 + ms(170)
            }
            Scheme::Http => {
                ts.got_connection = Some(t0 + ms(20));
                ts.first_response_byte = Some(t0 + ms(120));
                t0 + ms(130)
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        headers.insert("server", HeaderValue::from_static("nginx"));
        Visit {
            outcome: ExchangeOutcome {
                url: Url::parse("https://example.com/").unwrap(),
                status: StatusCode::OK,
                version: Version::HTTP_11,
                headers,
                tls_version: match scheme {
                    Scheme::Https => TlsVersion::Tls13,
                    Scheme::Http => TlsVersion::None,
                },
                body_message: "Body discarded".to_string(),
            },
            timeline: PhaseTimeline::compute(&ts, scheme, end).unwrap(),
        }
    }

    #[test]
    fn test_render_https_visit() {
        colored::control::set_override(false);
        let out = render_visit(&visit(Scheme::Https));

        assert!(out.starts_with("\nConnected via TLSv1.3\n\nHTTP/1.1 200 OK\n"));
        let server = out.find("Server: nginx").unwrap();
        let content_type = out.find("Content-Type: text/html").unwrap();
        assert!(server < content_type);
        assert!(out.contains("\nBody discarded\n"));
        assert!(out.contains("TLS Handshake"));
        assert!(out.contains("[      5ms  ┃          15ms  ┃         40ms  ┃            100ms  ┃            10ms  ]"));
        assert!(out.contains("namelookup:5ms "));
        assert!(out.contains("pretransfer:60ms "));
        assert!(out.contains("total:170ms"));
    }

    #[test]
    fn test_render_plaintext_timeline_has_no_tls_column() {
        colored::control::set_override(false);
        let v = visit(Scheme::Http);
        let out = render_timeline(&v.timeline);

        assert!(!out.contains("TLS Handshake"));
        assert!(!out.contains("pretransfer"));
        assert!(out.contains("[       5ms  ┃          15ms  ┃            100ms  ┃            10ms  ]"));
        assert!(out.contains("connect:20ms "));
        assert!(out.contains("total:130ms"));
    }

    #[test]
    fn test_json_report() {
        let v = visit(Scheme::Https);
        let json = serde_json::to_value(VisitReport::from(&v)).unwrap();

        assert_eq!(json["status"], 200);
        assert_eq!(json["reason"], "OK");
        assert_eq!(json["version"], "1.1");
        assert_eq!(json["tls_version"], "TLSv1.3");
        assert_eq!(json["headers"][0]["name"], "Server");
        assert_eq!(json["timeline"]["tls_handshake"], 40);
        assert_eq!(json["timeline"]["total"], 170);
    }
}
