use crate::cli::app_config::Cli;
use crate::http::body::BodyTarget;
use crate::http::connector::IpFamily;
use crate::http::request::{BodySource, RequestTemplate};
use crate::http::transport::TransportPolicy;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Method;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Normalises the command line URL.
///
/// Without a scheme the target is `http` when the authority ends in `:80`,
/// otherwise `https`.
pub fn parse_url(input: &str) -> Result<Url, anyhow::Error> {
    let url = if input.contains("://") {
        Url::parse(input)
    } else {
        let rest = input.strip_prefix("//").unwrap_or(input);
        let authority = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let scheme = if authority.ends_with(":80") {
            "http"
        } else {
            "https"
        };
        Url::parse(&format!("{scheme}://{rest}"))
    }
    .map_err(|e| anyhow!("could not parse url {input:?}: {e}"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("unsupported URL scheme {other:?} in {input:?}")),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("could not parse url {input:?}: missing host"));
    }
    Ok(url)
}

/// Splits `Name: value` at the first colon.
pub fn parse_header(header: &str) -> Result<(&str, &str), anyhow::Error> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow!("Header '{header}' has invalid format, missing ':'"))?;
    Ok((
        name.trim_end_matches(' '),
        value.trim_start_matches([' ', ':']),
    ))
}

impl Cli {
    /// The method sent on the wire; `-I` overrides `-X`.
    pub fn method(&self) -> Result<Method, anyhow::Error> {
        let requested = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| anyhow!("invalid HTTP method {:?}", self.method))?;
        let has_body = self.body.as_deref().is_some_and(|b| !b.is_empty());
        if (requested == Method::POST || requested == Method::PUT) && !has_body {
            return Err(anyhow!(
                "must supply post body using -d when POST or PUT is used"
            ));
        }

        if self.only_header {
            return Ok(Method::HEAD);
        }
        Ok(requested)
    }

    pub fn request_template(&self) -> Result<RequestTemplate, anyhow::Error> {
        let mut template = RequestTemplate::new(self.method()?);
        for header in &self.headers {
            let (name, value) = parse_header(header)?;
            if name.eq_ignore_ascii_case("host") {
                template.host = Some(value.to_string());
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("invalid header name in {header:?}: {e}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| anyhow!("invalid header value in {header:?}: {e}"))?;
            template.headers.append(name, value);
        }

        template.body = self.body.as_deref().filter(|b| !b.is_empty()).map(|body| {
            match body.strip_prefix('@') {
                Some(path) => BodySource::File(PathBuf::from(path)),
                None => BodySource::Inline(Bytes::from(body.to_string())),
            }
        });
        Ok(template)
    }

    pub fn ip_family(&self) -> IpFamily {
        match (self.ipv4, self.ipv6) {
            (true, _) => IpFamily::V4,
            (_, true) => IpFamily::V6,
            _ => IpFamily::Any,
        }
    }

    pub fn transport_policy(&self) -> TransportPolicy {
        TransportPolicy {
            insecure: self.insecure,
            client_cert: self.client_cert.clone(),
            family: self.ip_family(),
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
        }
    }

    pub fn body_target(&self) -> BodyTarget {
        match (&self.output, self.save_output) {
            (_, true) => BodyTarget::RemoteName,
            (Some(path), false) => BodyTarget::File(path.clone()),
            (None, false) => BodyTarget::Discard,
        }
    }
}
