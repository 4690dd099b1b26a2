use crate::error::HttpstatError;
use crate::timeline::Scheme;
use bytes::Bytes;
use futures::TryStreamExt;
use http::header::{ACCEPT, CONTENT_LENGTH, HOST, HeaderMap, HeaderValue, USER_AGENT};
use http::{Method, Request, Uri};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use std::io;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use url::Url;

pub type RequestBody = BoxBody<Bytes, io::Error>;

/// Where the request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Inline(Bytes),
    /// Streamed from disk; reopened for every visit.
    File(PathBuf),
}

/// One fully resolved request, built fresh for every visit.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub method: Method,
    pub target: Url,
    pub body: Option<BodySource>,
    pub headers: HeaderMap,
    pub host: Option<String>,
}

/// Method, headers and body policy shared by every visit of a redirect chain.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub body: Option<BodySource>,
    pub headers: HeaderMap,
    pub host: Option<String>,
}

impl RequestTemplate {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
            host: None,
        }
    }

    pub fn for_target(&self, target: Url) -> ExchangeRequest {
        ExchangeRequest {
            method: self.method.clone(),
            target,
            body: self.body.clone(),
            headers: self.headers.clone(),
            host: self.host.clone(),
        }
    }
}

impl ExchangeRequest {
    pub fn scheme(&self) -> Result<Scheme, HttpstatError> {
        Scheme::from_url(&self.target)
            .ok_or_else(|| HttpstatError::UnsupportedScheme(self.target.scheme().to_string()))
    }

    /// Value of the `Host` header: the override, or the URL authority.
    pub fn authority(&self) -> Result<String, HttpstatError> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        let host = self
            .target
            .host_str()
            .ok_or_else(|| HttpstatError::MissingHost(self.target.to_string()))?;
        Ok(match self.target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Name presented for SNI and certificate verification.
    pub fn server_name(&self) -> Result<String, HttpstatError> {
        let authority = match &self.host {
            Some(host) => host.clone(),
            None => self
                .target
                .host_str()
                .ok_or_else(|| HttpstatError::MissingHost(self.target.to_string()))?
                .to_string(),
        };
        Ok(strip_port(&authority).to_string())
    }

    /// `scheme://host:port/` of the target, with the port always explicit.
    pub fn origin_uri(&self) -> Result<Uri, HttpstatError> {
        let host = self
            .target
            .host_str()
            .ok_or_else(|| HttpstatError::MissingHost(self.target.to_string()))?;
        let port = self
            .target
            .port_or_known_default()
            .unwrap_or(self.scheme()?.default_port());
        let uri = format!("{}://{host}:{port}/", self.target.scheme()).parse::<Uri>();
        uri.map_err(|e| HttpstatError::Request(e.into()))
    }

    fn request_target(&self, absolute_form: bool) -> String {
        if absolute_form {
            let mut target = self.target.clone();
            target.set_fragment(None);
            return target.to_string();
        }
        match self.target.query() {
            Some(query) => format!("{}?{query}", self.target.path()),
            None => self.target.path().to_string(),
        }
    }

    async fn open_body(&self) -> Result<(RequestBody, Option<u64>), HttpstatError> {
        match &self.body {
            None => Ok((Empty::new().map_err(|never| match never {}).boxed(), None)),
            Some(BodySource::Inline(bytes)) => Ok((
                Full::new(bytes.clone())
                    .map_err(|never| match never {})
                    .boxed(),
                Some(bytes.len() as u64),
            )),
            Some(BodySource::File(path)) => {
                let file = tokio::fs::File::open(path).await.map_err(|e| {
                    HttpstatError::body_io(
                        format!("failed to open data file {}", path.display()),
                        e,
                    )
                })?;
                let len = file.metadata().await.ok().map(|m| m.len());
                let stream = ReaderStream::new(file).map_ok(Frame::data);
                Ok((StreamBody::new(stream).boxed(), len))
            }
        }
    }

    /// Builds the wire request. `absolute_form` is used when talking to a
    /// forward proxy.
    pub async fn to_http(
        &self,
        absolute_form: bool,
    ) -> Result<Request<RequestBody>, HttpstatError> {
        let (body, content_length) = self.open_body().await?;

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.request_target(absolute_form))
            .body(body)?;

        let headers = request.headers_mut();
        headers.insert(HOST, HeaderValue::from_str(&self.authority()?).map_err(http::Error::from)?);
        for (name, value) in self.headers.iter() {
            headers.append(name, value.clone());
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_static(concat!("httpstat/", env!("CARGO_PKG_VERSION"))),
            );
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        }
        if let (Some(BodySource::File(_)), Some(len)) = (&self.body, content_length)
            && !headers.contains_key(CONTENT_LENGTH)
        {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }

        Ok(request)
    }
}

/// `example.com:8443` -> `example.com`, `[::1]:443` -> `::1`.
fn strip_port(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host
        }
        _ => authority,
    }
}
