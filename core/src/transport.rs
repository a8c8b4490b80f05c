//! The network hop at the bottom of the interceptor chain.
//!
//! `Transport` is the only seam between the client and real I/O: the
//! interceptors and codec only ever see plain `HttpRequest`/`HttpResponse`
//! values, so tests can swap the network for an in-process fake.

use std::io;

use ureq::http;
use ureq::Agent;

use crate::config::Config;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, ResponseBody};

/// Executes one request. Non-2xx statuses are responses, not errors.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport over a `ureq` agent.
///
/// The read timeout bounds both waiting for the response head and reading
/// its body; the write timeout bounds sending the request head and body.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &Config) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout()))
            .timeout_send_request(Some(config.write_timeout()))
            .timeout_send_body(Some(config.write_timeout()))
            .timeout_recv_response(Some(config.read_timeout()))
            .timeout_recv_body(Some(config.read_timeout()))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let result = match request.body {
            Some(body) => self.agent.run(builder.body(body.into_bytes()).map_err(invalid)?),
            None => self.agent.run(builder.body(()).map_err(invalid)?),
        };
        let response = result.map_err(map_ureq_error)?;

        let (parts, body) = response.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        Ok(HttpResponse::new(
            parts.status.as_u16(),
            headers,
            ResponseBody::from_reader(body.into_reader()),
        ))
    }
}

fn invalid(err: http::Error) -> TransportError {
    TransportError::InvalidRequest(err.to_string())
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(which) => TransportError::Timeout(which.to_string()),
        ureq::Error::Io(e) => match e.kind() {
            io::ErrorKind::TimedOut => TransportError::Timeout(e.to_string()),
            io::ErrorKind::ConnectionRefused => TransportError::Connect(e.to_string()),
            _ => TransportError::Io(e),
        },
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::Connect(err.to_string())
        }
        ureq::Error::BadUri(uri) => TransportError::InvalidRequest(uri),
        other => TransportError::Connect(other.to_string()),
    }
}
