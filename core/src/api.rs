//! Stateless request builders for the marketplace backend.
//!
//! # Design
//! `MarketApi` holds only the base URL and never touches the network: each
//! `build_*` method returns a plain `HttpRequest`. `ApiClient` executes the
//! request through the interceptor chain and hands the response to the
//! codec.

use crate::codec::JsonCodec;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::types::{LoginRequest, NewTransaction, RegisterRequest};

#[derive(Debug, Clone)]
pub struct MarketApi {
    /// Always ends with `/`.
    base_url: String,
    codec: JsonCodec,
}

impl MarketApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            codec: JsonCodec,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn build_get(&self, path: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(path))
    }

    pub fn build_post<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = self.codec.encode(body)?;
        Ok(HttpRequest::new(HttpMethod::Post, self.url(path)).with_json_body(body))
    }

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        self.build_post("auth/login", input)
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        self.build_post("auth/register", input)
    }

    pub fn build_current_user(&self) -> HttpRequest {
        self.build_get("users/me")
    }

    pub fn build_list_products(&self) -> HttpRequest {
        self.build_get("products/")
    }

    pub fn build_list_transactions(&self) -> HttpRequest {
        self.build_get("transactions/")
    }

    pub fn build_create_transaction(&self, input: &NewTransaction) -> Result<HttpRequest, ApiError> {
        self.build_post("transactions/", input)
    }

    /// `qr_hash` is percent-encoded as a single path segment.
    pub fn build_product_traceability(&self, qr_hash: &str) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            self.url_with_segment("traceability/product/", qr_hash),
        )
    }

    /// `path` relative to the base URL, followed by `segment` as one encoded
    /// path segment. A base URL that does not parse is joined verbatim and
    /// rejected later by the transport.
    fn url_with_segment(&self, path: &str, segment: &str) -> String {
        let joined = self.url(path);
        let Ok(mut url) = url::Url::parse(&joined) else {
            return format!("{joined}{segment}");
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url.into()
    }
}
