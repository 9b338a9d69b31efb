use crate::{
    error::WireError,
    http::{Headers, Request, ETAG},
    log_debug, Result,
};
use std::sync::Arc;
use ureq::{http as wire, Agent};

/// A trait for a single HTTP round trip. Implementors take an immutable
/// `Request` and return a `Response` or fail with an I/O error. Leaf
/// implementors talk to the network, decorators wrap another `Transport` and
/// add one behavior around the call (caching, revalidation). Clients can
/// also mock the responses for testing purposes.
pub trait Transport {
    fn send(&self, request: &Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

/// Adapts lower level HTTP outputs to a common Response. Responses are
/// values: caches hand out clones and replace entries wholesale.
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct Response {
    #[builder(default = "200")]
    pub status: u16,
    #[builder(setter(into), default = "self.default_reason()")]
    pub reason: String,
    #[builder(default)]
    pub headers: Headers,
    #[builder(setter(into), default)]
    pub body: Vec<u8>,
}

impl ResponseBuilder {
    fn default_reason(&self) -> String {
        reason_phrase(self.status.unwrap_or(200)).to_string()
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    wire::StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn get_etag(&self) -> Option<&str> {
        self.header(ETAG)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body).map_err(|err| err.into())
    }
}

/// Network transport backed by `ureq`. Non-2xx statuses are responses, not
/// errors; only connection level failures are reported as
/// `WireError::HttpTransportError`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        UreqTransport
    }

    fn agent(request: &Request) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(request.connect_timeout().into()))
            .timeout_recv_response(Some(request.read_timeout().into()))
            .timeout_recv_body(Some(request.read_timeout().into()))
            .build()
            .into()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let agent = UreqTransport::agent(request);
        // set incoming requests headers
        let builder = request.headers().iter().fold(
            wire::Request::builder()
                .method(request.method().as_str())
                .uri(request.uri()),
            |builder, (key, values)| {
                values
                    .iter()
                    .fold(builder, |builder, value| builder.header(key, value))
            },
        );
        log_debug!("{} {}", request.method(), request.uri());
        let result = if request.body().is_empty() {
            agent.run(builder.body(()).map_err(invalid_request)?)
        } else {
            agent.run(builder.body(request.body()).map_err(invalid_request)?)
        };
        match result {
            Ok(mut response) => {
                let status = response.status();
                // Headers that are not visible ASCII cannot be represented
                // as strings and are dropped.
                let headers = response
                    .headers()
                    .iter()
                    .filter_map(|(name, value)| {
                        value.to_str().ok().map(|value| (name.as_str(), value))
                    })
                    .collect::<Headers>();
                let body = response
                    .body_mut()
                    .read_to_vec()
                    .map_err(|err| WireError::HttpTransportError(err.to_string()))?;
                let response = Response::builder()
                    .status(status.as_u16())
                    .reason(status.canonical_reason().unwrap_or(""))
                    .headers(headers)
                    .body(body)
                    .build()?;
                log_debug!("{} {} -> {}", request.method(), request.uri(), response.status);
                Ok(response)
            }
            Err(err) => Err(WireError::HttpTransportError(err.to_string()).into()),
        }
    }
}

fn invalid_request(err: wire::Error) -> anyhow::Error {
    WireError::RequestBuildError(err.to_string()).into()
}
