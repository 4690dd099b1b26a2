//! Follows a chain of redirects one visit at a time.
//!
//! Every hop is a complete, freshly connected exchange; the only state that
//! survives between hops is the number of redirects already followed.

use crate::error::HttpstatError;
use crate::http::handler::{Exchange, ExchangeOutcome, Visit};
use crate::http::request::RequestTemplate;
use url::Url;

pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RedirectState {
    followed: usize,
}

impl RedirectState {
    pub fn followed(&self) -> usize {
        self.followed
    }

    /// Counts one more hop and fails once the chain is longer than
    /// [`MAX_REDIRECTS`].
    pub fn advance(&mut self) -> Result<usize, HttpstatError> {
        self.followed += 1;
        if self.followed > MAX_REDIRECTS {
            return Err(HttpstatError::TooManyRedirects { max: MAX_REDIRECTS });
        }
        Ok(self.followed)
    }
}

/// Where the chain goes after `outcome`, or `None` when it stops here.
///
/// A redirect status without a `Location` header ends the chain quietly.
pub fn next_target(outcome: &ExchangeOutcome, follow: bool) -> Result<Option<Url>, HttpstatError> {
    if !follow || !outcome.is_redirect() {
        return Ok(None);
    }
    let Some(location) = outcome.location() else {
        debug!("{} response without Location header", outcome.status);
        return Ok(None);
    };

    let location = location
        .to_str()
        .map_err(|e| HttpstatError::InvalidRedirect {
            location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
            reason: e.to_string(),
        })?;
    let target = outcome
        .url
        .join(location)
        .map_err(|e| HttpstatError::InvalidRedirect {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Some(target))
}

/// Visits `target`, then keeps visiting redirect targets while `follow` is
/// set. `on_visit` sees every completed visit, the last one included, before
/// the next hop starts.
pub async fn follow_redirects<E, F>(
    exchanger: &mut E,
    template: &RequestTemplate,
    target: Url,
    follow: bool,
    mut on_visit: F,
) -> Result<Visit, HttpstatError>
where
    E: Exchange,
    F: FnMut(&Visit),
{
    let mut state = RedirectState::default();
    let mut target = target;

    loop {
        let visit = exchanger.exchange(template.for_target(target)).await?;
        on_visit(&visit);

        let Some(next) = next_target(&visit.outcome, follow)? else {
            return Ok(visit);
        };
        let hop = state.advance()?;
        info!("Redirecting to {next} ({hop}/{MAX_REDIRECTS})");
        target = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::ExchangeRequest;
    use crate::timeline::{PhaseTimeline, Scheme};
    use crate::tls::TlsVersion;
    use crate::trace::TraceTimestamps;
    use http::header::LOCATION;
    use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    /// Answers every exchange from a script, repeating the last entry when
    /// the script runs out.
    struct FakeExchange {
        script: VecDeque<(u16, Option<&'static str>)>,
        last: (u16, Option<&'static str>),
        requests: Vec<ExchangeRequest>,
    }

    impl FakeExchange {
        fn new(script: &[(u16, Option<&'static str>)]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                last: *script.last().unwrap(),
                requests: Vec::new(),
            }
        }
    }

    fn timeline() -> PhaseTimeline {
        let t0 = Instant::now();
        let ts = TraceTimestamps {
            connect_start: Some(t0),
            connect_done: Some(t0 + Duration::from_millis(1)),
            got_connection: Some(t0 + Duration::from_millis(1)),
            first_response_byte: Some(t0 + Duration::from_millis(2)),
            ..Default::default()
        };
        PhaseTimeline::compute(&ts, Scheme::Http, t0 + Duration::from_millis(3)).unwrap()
    }

    impl Exchange for FakeExchange {
        async fn exchange(&mut self, request: ExchangeRequest) -> Result<Visit, HttpstatError> {
            let (status, location) = self.script.pop_front().unwrap_or(self.last);
            let mut headers = HeaderMap::new();
            if let Some(location) = location {
                headers.insert(LOCATION, HeaderValue::from_static(location));
            }
            let outcome = ExchangeOutcome {
                url: request.target.clone(),
                status: StatusCode::from_u16(status).unwrap(),
                version: Version::HTTP_11,
                headers,
                tls_version: TlsVersion::None,
                body_message: String::new(),
            };
            self.requests.push(request);
            Ok(Visit {
                outcome,
                timeline: timeline(),
            })
        }
    }

    fn start() -> Url {
        Url::parse("http://example.com/start").unwrap()
    }

    #[tokio::test]
    async fn test_redirect_not_followed_when_disabled() {
        let mut fake = FakeExchange::new(&[(302, Some("/next"))]);
        let template = RequestTemplate::new(Method::GET);

        let visit = follow_redirects(&mut fake, &template, start(), false, |_| {})
            .await
            .unwrap();
        assert_eq!(visit.outcome.status, StatusCode::FOUND);
        assert_eq!(fake.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_too_many_redirects_after_eleven_visits() {
        let mut fake = FakeExchange::new(&[(302, Some("/loop"))]);
        let template = RequestTemplate::new(Method::GET);
        let mut seen = 0;

        let err = follow_redirects(&mut fake, &template, start(), true, |_| seen += 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HttpstatError::TooManyRedirects { max: MAX_REDIRECTS }
        ));
        assert_eq!(fake.requests.len(), MAX_REDIRECTS + 1);
        assert_eq!(seen, MAX_REDIRECTS + 1);
    }

    #[tokio::test]
    async fn test_ten_redirects_are_allowed() {
        let mut script = vec![(302, Some("/hop")); MAX_REDIRECTS];
        script.push((200, None));
        let mut fake = FakeExchange::new(&script);
        let template = RequestTemplate::new(Method::GET);

        let visit = follow_redirects(&mut fake, &template, start(), true, |_| {})
            .await
            .unwrap();
        assert_eq!(visit.outcome.status, StatusCode::OK);
        assert_eq!(fake.requests.len(), MAX_REDIRECTS + 1);
    }

    #[tokio::test]
    async fn test_redirect_without_location_stops_quietly() {
        let mut fake = FakeExchange::new(&[(301, None)]);
        let template = RequestTemplate::new(Method::GET);

        let visit = follow_redirects(&mut fake, &template, start(), true, |_| {})
            .await
            .unwrap();
        assert_eq!(visit.outcome.status, StatusCode::MOVED_PERMANENTLY);
        assert_eq!(fake.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_relative_location_resolved_and_template_reused() {
        let mut fake = FakeExchange::new(&[
            (307, Some("../other?x=1")),
            (302, Some("https://secure.example.com/final")),
            (200, None),
        ]);
        let mut template = RequestTemplate::new(Method::PUT);
        template
            .headers
            .insert("x-token", HeaderValue::from_static("abc"));

        follow_redirects(
            &mut fake,
            &template,
            Url::parse("http://example.com/a/b/start").unwrap(),
            true,
            |_| {},
        )
        .await
        .unwrap();

        let targets: Vec<String> = fake.requests.iter().map(|r| r.target.to_string()).collect();
        assert_eq!(
            targets,
            vec![
                "http://example.com/a/b/start",
                "http://example.com/a/other?x=1",
                "https://secure.example.com/final",
            ]
        );
        for request in &fake.requests {
            assert_eq!(request.method, Method::PUT);
            assert_eq!(request.headers.get("x-token").unwrap(), "abc");
        }
    }

    #[test]
    fn test_state_counts_up_to_limit() {
        let mut state = RedirectState::default();
        for hop in 1..=MAX_REDIRECTS {
            assert_eq!(state.advance().unwrap(), hop);
        }
        assert!(state.advance().is_err());
        assert_eq!(state.followed(), MAX_REDIRECTS + 1);
    }
}
