use crate::error::HttpstatError;
use crate::http::body::{BodyTarget, consume_body};
use crate::http::request::ExchangeRequest;
use crate::http::transport::Transport;
use crate::timeline::PhaseTimeline;
use crate::tls::TlsVersion;
use crate::trace::{ClientTrace, TraceCollector};
use http::header::LOCATION;
use http::{HeaderMap, HeaderValue, StatusCode, Version};
use hyper::body::Body;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use url::Url;

/// Response metadata of one visit, handed to the rendering layer as is.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub url: Url,
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub tls_version: TlsVersion,
    pub body_message: String,
}

impl ExchangeOutcome {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status.as_u16())
    }

    pub fn location(&self) -> Option<&HeaderValue> {
        self.headers.get(LOCATION)
    }
}

/// One completed, timed round trip.
#[derive(Debug, Clone)]
pub struct Visit {
    pub outcome: ExchangeOutcome,
    pub timeline: PhaseTimeline,
}

/// Performs exactly one timed round trip per call.
#[allow(async_fn_in_trait)]
pub trait Exchange {
    async fn exchange(&mut self, request: ExchangeRequest) -> Result<Visit, HttpstatError>;
}

/// The real exchange driver: fresh connection, traced, never following
/// redirects on its own.
pub struct Driver {
    transport: Transport,
    body: BodyTarget,
    announce: bool,
}

impl Driver {
    pub fn new(transport: Transport, body: BodyTarget) -> Self {
        Self {
            transport,
            body,
            announce: true,
        }
    }

    /// Keeps connection notices off stdout.
    pub fn silent(mut self) -> Self {
        self.announce = false;
        self
    }

    async fn visit(
        &self,
        request: &ExchangeRequest,
        collector: Arc<TraceCollector>,
    ) -> Result<Visit, HttpstatError> {
        let scheme = request.scheme()?;
        let trace: Arc<dyn ClientTrace> = collector.clone();
        let connection = self.transport.connect(request, scheme, trace).await?;

        let http_request = request.to_http(connection.absolute_form).await?;
        debug!(
            "> {} {} {:?}",
            http_request.method(),
            http_request.uri(),
            http_request.version()
        );
        for (key, value) in http_request.headers().iter() {
            debug!("> {}: {}", key, String::from_utf8_lossy(value.as_bytes()));
        }
        if let Some(length) = http_request.body().size_hint().exact() {
            debug!("> Content-Length: {length}");
        }
        debug!(">");

        let mut sender = connection.sender;
        let response = sender
            .send_request(http_request)
            .await
            .map_err(|source| HttpstatError::Http {
                phase: collector.snapshot().pending_phase(),
                source,
            })?;
        drop(sender);

        debug!("< {:?} {}", response.version(), response.status());
        for (key, value) in response.headers().iter() {
            debug!("< {}: {}", key, String::from_utf8_lossy(value.as_bytes()));
        }
        debug!("<");

        let (parts, body) = response.into_parts();
        let body_message = consume_body(&self.body, request, &parts, body).await?;
        let end = Instant::now();

        let timeline = PhaseTimeline::compute(&collector.snapshot(), scheme, end)?;
        Ok(Visit {
            outcome: ExchangeOutcome {
                url: request.target.clone(),
                status: parts.status,
                version: parts.version,
                headers: parts.headers,
                tls_version: connection.tls_version,
                body_message,
            },
            timeline,
        })
    }
}

impl Exchange for Driver {
    async fn exchange(&mut self, request: ExchangeRequest) -> Result<Visit, HttpstatError> {
        let collector = Arc::new(if self.announce {
            TraceCollector::new()
        } else {
            TraceCollector::silent()
        });
        let Some(limit) = self.transport.timeout() else {
            return self.visit(&request, collector).await;
        };

        match timeout(limit, self.visit(&request, collector.clone())).await {
            Ok(result) => result,
            Err(_) => Err(HttpstatError::Timeout {
                timeout: limit,
                phase: collector.snapshot().pending_phase(),
            }),
        }
    }
}
