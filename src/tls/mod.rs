pub mod config;
pub mod verifier;

use rustls::ProtocolVersion;
use serde::Serialize;
use std::fmt;

/// TLS version negotiated for a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TlsVersion {
    #[serde(rename = "plaintext")]
    None,
    #[serde(rename = "TLSv1.2")]
    Tls12,
    #[serde(rename = "TLSv1.3")]
    Tls13,
    #[serde(rename = "unknown")]
    Unknown,
}

impl From<Option<ProtocolVersion>> for TlsVersion {
    fn from(version: Option<ProtocolVersion>) -> Self {
        match version {
            Some(ProtocolVersion::TLSv1_2) => TlsVersion::Tls12,
            Some(ProtocolVersion::TLSv1_3) => TlsVersion::Tls13,
            Some(_) | None => TlsVersion::Unknown,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TlsVersion::None => "plaintext",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
            TlsVersion::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
