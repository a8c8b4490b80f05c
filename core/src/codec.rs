//! JSON encoding of request bodies and decoding of responses.
//!
//! Date-typed fields are decoded through `dates::lenient` by the DTOs
//! themselves (see `types`), so an unparseable date never fails a decode.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::HttpResponse;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String, ApiError> {
        serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// Decode a 2xx body as `T`. Any other status becomes
    /// `ApiError::Backend` carrying the body as text.
    pub fn decode<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        let bytes = self.success_body(response)?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Like `decode`, for endpoints whose body is irrelevant.
    pub fn expect_success(&self, response: HttpResponse) -> Result<(), ApiError> {
        self.success_body(response).map(|_| ())
    }

    fn success_body(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        let status = response.status;
        let success = response.is_success();
        let bytes = response
            .body
            .into_bytes()
            .map_err(|e| ApiError::Transport(e.into()))?;
        if !success {
            return Err(ApiError::Backend {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseBody;
    use crate::types::{Product, Transaction};

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, Vec::new(), ResponseBody::from_bytes(body))
    }

    #[test]
    fn decodes_success_body() {
        let products: Vec<Product> = JsonCodec
            .decode(response(
                200,
                r#"[{"id":1,"name":"Manzana","price":1.2,"is_eco":true}]"#,
            ))
            .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Manzana");
        assert!(products[0].is_eco);
    }

    #[test]
    fn non_success_is_passed_through() {
        let err = JsonCodec
            .decode::<Vec<Product>>(response(503, "upstream down"))
            .unwrap_err();
        match err {
            ApiError::Backend { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_json_is_a_deserialization_error() {
        let err = JsonCodec
            .decode::<Vec<Product>>(response(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn unparseable_date_does_not_fail_the_record() {
        let tx: Transaction = JsonCodec
            .decode(response(
                201,
                r#"{"id":1,"user_id":2,"total_price":3.0,"created_at":"06/09/2025"}"#,
            ))
            .unwrap();
        assert_eq!(tx.created_at, None);
    }

    #[test]
    fn expect_success_ignores_body() {
        assert!(JsonCodec.expect_success(response(204, "")).is_ok());
        assert!(JsonCodec.expect_success(response(404, "")).is_err());
    }
}
