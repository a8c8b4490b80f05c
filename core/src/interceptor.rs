//! Request/response interceptors.
//!
//! # Design
//! The chain is closed and order-sensitive, so it is composed statically:
//! `InterceptorChain::proceed` nests `DiagnosticInterceptor` around
//! `AuthorizationInterceptor` around the transport. Each interceptor gets the
//! request by value plus a `next` continuation, and may rewrite the request
//! before calling `next` and the response after it returns.
//!
//! Because the diagnostic step runs first, its request log never contains
//! the bearer token it adds. Bodies of auth-path exchanges (passwords on the
//! way out, access tokens on the way back) and any caller-supplied
//! `Authorization` header are logged as `<redacted>`.

use std::sync::Arc;
use std::time::Instant;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, ResponseBody};
use crate::session::SessionStore;
use crate::transport::Transport;

/// Requests whose path contains this are sent without a bearer token.
pub const AUTH_PATH_MARKER: &str = "/auth/";

const REDACTED: &str = "<redacted>";

pub trait Interceptor {
    fn intercept<F>(&self, request: HttpRequest, next: F) -> Result<HttpResponse, TransportError>
    where
        F: FnOnce(HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Logs every exchange and buffers the response body so it can be logged
/// and still read downstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticInterceptor;

impl DiagnosticInterceptor {
    /// Read `response.body` into memory and put an equivalent, fresh body
    /// back. Returns the bytes that were read.
    fn buffer_body(response: &mut HttpResponse) -> Result<Vec<u8>, TransportError> {
        let body = std::mem::replace(&mut response.body, ResponseBody::empty());
        let bytes = body.into_bytes()?;
        response.body = ResponseBody::from_bytes(bytes.clone());
        Ok(bytes)
    }

    fn loggable_body(sensitive: bool, body: &str) -> &str {
        if sensitive && !body.is_empty() {
            REDACTED
        } else {
            body
        }
    }

    fn loggable_headers(headers: &[(String, String)]) -> Vec<(&str, &str)> {
        headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), REDACTED)
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect()
    }
}

impl Interceptor for DiagnosticInterceptor {
    fn intercept<F>(&self, request: HttpRequest, next: F) -> Result<HttpResponse, TransportError>
    where
        F: FnOnce(HttpRequest) -> Result<HttpResponse, TransportError>,
    {
        let method = request.method;
        let url = request.url.clone();
        let sensitive = AuthorizationInterceptor::is_auth_endpoint(&request);
        tracing::debug!(
            %method,
            %url,
            headers = ?Self::loggable_headers(&request.headers),
            body = Self::loggable_body(sensitive, request.body.as_deref().unwrap_or("")),
            "request"
        );

        let started = Instant::now();
        let outcome = next(request).and_then(|mut response| {
            let bytes = Self::buffer_body(&mut response)?;
            Ok((response, bytes))
        });
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((response, bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                tracing::debug!(
                    %method,
                    %url,
                    status = response.status,
                    elapsed_ms,
                    headers = ?response.headers,
                    body = Self::loggable_body(sensitive, &text),
                    "response"
                );
                Ok(response)
            }
            Err(err) => {
                tracing::error!(%method, %url, elapsed_ms, error = %err, "request failed");
                Err(err)
            }
        }
    }
}

/// Attaches `Authorization: Bearer <token>` from the session store.
#[derive(Clone)]
pub struct AuthorizationInterceptor {
    session: Arc<SessionStore>,
}

impl AuthorizationInterceptor {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// Substring match on the URL path, so `/auth/login`, `/auth/register`
    /// and also `/v1/auth/anything` are exempt.
    pub fn is_auth_endpoint(request: &HttpRequest) -> bool {
        request.path().contains(AUTH_PATH_MARKER)
    }

    /// The pre-send rewrite on its own.
    pub fn authorize(&self, mut request: HttpRequest) -> HttpRequest {
        if Self::is_auth_endpoint(&request) {
            return request;
        }
        if let Some(value) = self.session.current_authorization_header_value() {
            request.set_header("Authorization", value);
        }
        request
    }
}

impl Interceptor for AuthorizationInterceptor {
    fn intercept<F>(&self, request: HttpRequest, next: F) -> Result<HttpResponse, TransportError>
    where
        F: FnOnce(HttpRequest) -> Result<HttpResponse, TransportError>,
    {
        next(self.authorize(request))
    }
}

/// `[Diagnostic, Authorization]`, in that order, for every call.
#[derive(Clone)]
pub struct InterceptorChain {
    diagnostic: DiagnosticInterceptor,
    authorization: AuthorizationInterceptor,
}

impl InterceptorChain {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            diagnostic: DiagnosticInterceptor,
            authorization: AuthorizationInterceptor::new(session),
        }
    }

    pub fn proceed(
        &self,
        request: HttpRequest,
        transport: &dyn Transport,
    ) -> Result<HttpResponse, TransportError> {
        self.diagnostic.intercept(request, |request| {
            self.authorization
                .intercept(request, |request| transport.send(request))
        })
    }
}
