//! Authenticated API client for the farm-to-table marketplace backend.
//!
//! # Overview
//! Every call goes `ClientFactory::get_client` → `ApiClient` →
//! `InterceptorChain` (diagnostic logging, then bearer-token injection from
//! the `SessionStore`) → `Transport` → back through the chain → `JsonCodec`,
//! whose DTOs decode date fields through the lenient `dates` normalizer.
//!
//! # Design
//! - Requests are plain data; the transport is the only I/O seam, so
//!   everything above it is testable without a network.
//! - The session store and the cached client are explicitly owned handles
//!   (`Arc<SessionStore>`, `ClientFactory`), not ambient globals.
//! - Token and date parsing recover locally (absent / not authenticated);
//!   transport and backend errors always reach the caller.

pub mod api;
pub mod claims;
pub mod client;
pub mod codec;
pub mod config;
pub mod dates;
pub mod error;
pub mod factory;
pub mod http;
pub mod interceptor;
pub mod session;
pub mod transport;
pub mod types;

pub use api::MarketApi;
pub use claims::Claims;
pub use client::ApiClient;
pub use codec::JsonCodec;
pub use config::{Config, ConfigProvider, EnvConfig};
pub use error::{ApiError, CredentialError, SessionError, TransportError, UnparseableDate};
pub use factory::ClientFactory;
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use interceptor::{AuthorizationInterceptor, DiagnosticInterceptor, InterceptorChain};
pub use session::{FileBackend, MemoryBackend, Session, SessionBackend, SessionStore};
pub use transport::{Transport, UreqTransport};
pub use types::{
    CartItem, LoginRequest, LoginResponse, NewTransaction, Product, ProductTraceability,
    RegisterRequest, RegisterResponse, Role, TraceabilityEvent, Transaction, UserProfile,
};
