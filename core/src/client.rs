//! The configured client: request builders, interceptor chain, transport and
//! codec bound together.
//!
//! An `ApiClient` is immutable once built and safe to share across threads;
//! the only mutable state it touches is the `SessionStore`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::MarketApi;
use crate::claims::{self, Claims};
use crate::codec::JsonCodec;
use crate::error::{ApiError, CredentialError};
use crate::http::{HttpRequest, HttpResponse};
use crate::interceptor::InterceptorChain;
use crate::session::{Session, SessionStore};
use crate::transport::Transport;
use crate::types::{
    LoginRequest, LoginResponse, NewTransaction, Product, ProductTraceability, RegisterRequest,
    RegisterResponse, Role, Transaction, UserProfile,
};

pub struct ApiClient {
    api: MarketApi,
    chain: InterceptorChain,
    transport: Box<dyn Transport>,
    codec: JsonCodec,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<SessionStore>, transport: Box<dyn Transport>) -> Self {
        Self {
            api: MarketApi::new(base_url),
            chain: InterceptorChain::new(Arc::clone(&session)),
            transport,
            codec: JsonCodec,
            session,
        }
    }

    pub fn api(&self) -> &MarketApi {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Run `request` through the interceptor chain. Any status is returned
    /// as a response; only transport failures are errors.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        Ok(self.chain.proceed(request, self.transport.as_ref())?)
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(self.api.build_get(path))?;
        self.codec.decode(response)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(self.api.build_post(path, body)?)?;
        self.codec.decode(response)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self.api.build_login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.codec.decode(self.execute(request)?)
    }

    pub fn register(&self, input: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        self.codec.decode(self.execute(self.api.build_register(input)?)?)
    }

    /// Log in and start a session from the returned token.
    ///
    /// Identity comes from the token's claims. When a claim is missing, or the
    /// token cannot be decoded, the user id falls back to `0`, the role to
    /// consumer and the display name to the local part of `email`.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let login = self.login(email, password)?;
        let claims = claims::decode(&login.access_token).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "login token could not be decoded; using fallbacks");
            Claims::default()
        });

        let user_id = claims.subject_user_id.unwrap_or(0);
        let role = claims.role().unwrap_or(Role::Consumer);
        let display_name = claims
            .display_name
            .clone()
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        self.session
            .start_session(&login.access_token, user_id, email, role, &display_name)?;
        Ok(self.session.snapshot())
    }

    pub fn sign_out(&self) -> Result<(), ApiError> {
        Ok(self.session.end_session()?)
    }

    /// Check the stored credential. A missing, malformed or expired token
    /// ends the session and is reported as a `CredentialError`.
    pub fn validate_session(&self) -> Result<Claims, ApiError> {
        let outcome = match self.session.current_token() {
            Some(token) => claims::validate(&token),
            None => Err(CredentialError::Expired { expires_at: None }),
        };
        match outcome {
            Ok(claims) => Ok(claims),
            Err(err) => {
                tracing::info!(error = %err, "stored credential rejected; ending session");
                self.session.end_session()?;
                Err(err.into())
            }
        }
    }

    pub fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.codec.decode(self.execute(self.api.build_current_user())?)
    }

    pub fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.codec.decode(self.execute(self.api.build_list_products())?)
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        self.codec.decode(self.execute(self.api.build_list_transactions())?)
    }

    pub fn create_transaction(&self, input: &NewTransaction) -> Result<Transaction, ApiError> {
        self.codec
            .decode(self.execute(self.api.build_create_transaction(input)?)?)
    }

    pub fn product_traceability(&self, qr_hash: &str) -> Result<ProductTraceability, ApiError> {
        self.codec
            .decode(self.execute(self.api.build_product_traceability(qr_hash))?)
    }
}
