use hyper::Uri;
use std::net::IpAddr;
use url::Url;

/// Proxy settings resolved once from the environment at startup.
///
/// Recognised variables:
/// - `HTTPS_PROXY` / `https_proxy` for HTTPS URLs, falling back to the HTTP proxy
/// - `HTTP_PROXY` / `http_proxy` for HTTP URLs
/// - `NO_PROXY` / `no_proxy` for hosts that must be reached directly
///
/// Proxy values may be a full URL (`http://127.0.0.1:7890`) or a bare
/// `HOST[:PORT]`. Other proxy schemes (`socks5://...`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPolicy {
    http: Option<Uri>,
    https: Option<Uri>,
    no_proxy: Vec<String>,
}

impl ProxyPolicy {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the policy from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |upper: &str, lower: &str| {
            lookup(upper)
                .or_else(|| lookup(lower))
                .filter(|value| !value.trim().is_empty())
        };

        let http = var("HTTP_PROXY", "http_proxy").and_then(|v| parse_proxy(&v));
        let https = var("HTTPS_PROXY", "https_proxy")
            .and_then(|v| parse_proxy(&v))
            .or_else(|| http.clone());
        let no_proxy = var("NO_PROXY", "no_proxy")
            .map(|v| {
                v.split(',')
                    .map(|pattern| pattern.trim().to_ascii_lowercase())
                    .filter(|pattern| !pattern.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if let Some(proxy) = &http {
            debug!("HTTP proxy from environment: {proxy}");
        }
        if let Some(proxy) = &https {
            debug!("HTTPS proxy from environment: {proxy}");
        }

        Self {
            http,
            https,
            no_proxy,
        }
    }

    /// The proxy a request to `target` should go through, if any.
    pub fn proxy_for(&self, target: &Url) -> Option<&Uri> {
        let host = match target.host_str() {
            Some(h) => h.trim_start_matches('[').trim_end_matches(']'),
            None => return None,
        };
        if self.should_bypass(host) {
            return None;
        }
        match target.scheme() {
            "https" => self.https.as_ref(),
            "http" => self.http.as_ref(),
            _ => None,
        }
    }

    /// Check if a host should bypass the proxy.
    ///
    /// Loopback destinations are always reached directly. `NO_PROXY` supports:
    /// - `*` - every host
    /// - `example.com` - the domain and its subdomains
    /// - `.example.com` - subdomains only, plus the bare domain
    /// - `192.168.1.1` - exact IP match
    ///
    /// A `:port` suffix on a pattern is ignored.
    pub fn should_bypass(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if host == "localhost" || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback()) {
            return true;
        }

        for pattern in &self.no_proxy {
            if pattern == "*" {
                return true;
            }
            let pattern = strip_port(pattern);
            if let Some(suffix) = pattern.strip_prefix('.') {
                if host.ends_with(pattern) || host == suffix {
                    return true;
                }
            } else if host == pattern || host.ends_with(&format!(".{pattern}")) {
                return true;
            }
        }

        false
    }
}

fn strip_port(pattern: &str) -> &str {
    if pattern.starts_with('[') {
        return pattern
            .split(']')
            .next()
            .unwrap_or(pattern)
            .trim_start_matches('[');
    }
    match pattern.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !host.contains(':') => {
            host
        }
        _ => pattern,
    }
}

/// Normalises a proxy value into `http://host:port`.
fn parse_proxy(value: &str) -> Option<Uri> {
    let value = value.trim();
    let with_scheme = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    };

    let url = Url::parse(&with_scheme).ok()?;
    let port = match url.scheme() {
        "http" => url.port().unwrap_or(80),
        "https" => url.port().unwrap_or(443),
        other => {
            warn!("Ignoring proxy {value}: scheme {other} is not supported");
            return None;
        }
    };
    let host = url.host_str()?;
    format!("http://{host}:{port}").parse().ok()
}
