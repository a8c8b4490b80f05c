//! End-to-end tests against the live mock backend.
//!
//! # Design
//! Each test starts the mock server on a random port in its own thread, then
//! drives the client through `ClientFactory` with the real `UreqTransport`,
//! so request building, interceptors, timeouts and response decoding are all
//! exercised over actual HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use farmtable_core::{
    ApiError, ClientFactory, Config, CredentialError, FileBackend, NewTransaction, Product, Role,
    SessionStore, TransportError,
};

const EMAIL: &str = mock_server::DEMO_EMAIL;
const PASSWORD: &str = mock_server::DEMO_PASSWORD;

/// Start a mock backend whose tokens live `token_ttl_secs`.
fn start_server(token_ttl_secs: i64) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::serve(listener, mock_server::app_with_token_ttl(token_ttl_secs)).await
        })
        .unwrap();
    });
    addr
}

fn factory_for(config: Config) -> ClientFactory {
    ClientFactory::new(Arc::new(config), Arc::new(SessionStore::in_memory()))
}

fn live_factory() -> ClientFactory {
    factory_for(Config::new(&format!("http://{}", start_server(3600))))
}

#[test]
fn sign_in_then_authenticated_calls() {
    let factory = live_factory();
    let client = factory.get_client().unwrap();

    let session = client.sign_in(EMAIL, PASSWORD).unwrap();
    assert!(session.logged_in);
    assert_eq!(session.user_id, Some(1));
    assert_eq!(session.role, Some(Role::Farmer));
    assert_eq!(session.display_name.as_deref(), Some("María López"));

    let me = client.current_user().unwrap();
    assert_eq!(me.email, EMAIL);
    assert!(me.created_at.is_some());

    let products = client.products().unwrap();
    assert_eq!(products.len(), 3);
    assert!(products.iter().any(|p| p.name == "Miel de azahar"));

    let claims = client.validate_session().unwrap();
    assert_eq!(claims.subject_user_id, Some(1));
}

#[test]
fn login_with_wrong_password_is_backend_401() {
    let client = live_factory().get_client().unwrap();
    let err = client.sign_in(EMAIL, "wrong").unwrap_err();
    match err {
        ApiError::Backend { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid credentials"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!client.session().is_logged_in());
}

#[test]
fn unauthenticated_call_surfaces_401() {
    let client = live_factory().get_client().unwrap();
    let err = client.transactions().unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[test]
fn auth_paths_are_sent_without_bearer_token() {
    let client = live_factory().get_client().unwrap();
    client.sign_in(EMAIL, PASSWORD).unwrap();

    let on_auth: HashMap<String, String> = client.get_json("auth/echo-headers").unwrap();
    assert!(!on_auth.contains_key("authorization"));

    let elsewhere: HashMap<String, String> = client.get_json("echo-headers").unwrap();
    let token = client.session().current_token().unwrap();
    assert_eq!(elsewhere["authorization"], format!("Bearer {token}"));
}

#[test]
fn register_new_account_and_sign_in() {
    let client = live_factory().get_client().unwrap();
    let created = client
        .register(&farmtable_core::RegisterRequest {
            name: "Super Sol".to_string(),
            email: "compras@supersol.es".to_string(),
            password: "pw".to_string(),
            role: Role::Supermarket,
            entity_name: Some("Super Sol".to_string()),
            location_lat: None,
            location_lon: None,
        })
        .unwrap();
    assert_eq!(created.email, "compras@supersol.es");

    let session = client.sign_in("compras@supersol.es", "pw").unwrap();
    assert_eq!(session.user_id, Some(created.id));
    assert_eq!(session.role, Some(Role::Supermarket));
}

#[test]
fn transactions_tolerate_unparseable_dates() {
    let client = live_factory().get_client().unwrap();
    client.sign_in(EMAIL, PASSWORD).unwrap();

    let transactions = client.transactions().unwrap();
    assert_eq!(transactions.len(), 2);
    assert!(transactions[0].created_at.is_some());
    assert!(transactions[0].confirmed_at.is_some());
    assert!(transactions[1].created_at.is_some());
    assert_eq!(transactions[1].confirmed_at, None);
}

#[test]
fn create_transaction_round_trip() {
    let client = live_factory().get_client().unwrap();
    client.sign_in(EMAIL, PASSWORD).unwrap();

    let created = client
        .create_transaction(&NewTransaction {
            shopping_list_id: None,
            total_price: 3.0,
            currency: "EUR".to_string(),
            payment_method: "card".to_string(),
            delivery_address: Some("Calle Mayor 1".to_string()),
            phone: None,
            items: Vec::new(),
        })
        .unwrap();
    assert_eq!(created.user_id, 1);
    assert_eq!(created.status.as_deref(), Some("pending"));
    assert!(created.created_at.is_some());
    assert_eq!(client.transactions().unwrap().len(), 3);
}

#[test]
fn traceability_events_decode_with_partial_dates() {
    let client = live_factory().get_client().unwrap();
    client.sign_in(EMAIL, PASSWORD).unwrap();

    let trace = client.product_traceability(mock_server::DEMO_QR_HASH).unwrap();
    assert_eq!(trace.product_name, "Tomate rosa");
    let stamped: Vec<bool> = trace
        .traceability_events
        .iter()
        .map(|e| e.timestamp.is_some())
        .collect();
    assert_eq!(stamped, vec![true, true, false]);

    assert_eq!(client.product_traceability("missing").unwrap_err().status(), Some(404));
}

#[test]
fn large_multibyte_body_survives_diagnostic_logging() {
    let client = live_factory().get_client().unwrap();

    let response = client
        .execute(client.api().build_get("catalog/large"))
        .unwrap();
    assert!(response.is_success());
    let text = response.body.into_string().unwrap();
    assert!(text.len() > 10 * 1024);
    assert!(text.contains("Padrón"));

    let products: Vec<Product> = client.get_json("catalog/large").unwrap();
    assert_eq!(products.len(), 200);
    assert!(products[199].name.contains("nº199"));
}

#[test]
fn slow_response_times_out() {
    let addr = start_server(3600);
    let factory = factory_for(Config::new(&format!("http://{addr}")).with_timeouts(5, 1, 5));
    let client = factory.get_client().unwrap();

    let err = client
        .get_json::<serde_json::Value>("slow/2500")
        .unwrap_err();
    assert!(
        matches!(err, ApiError::Transport(TransportError::Timeout(_))),
        "unexpected error: {err:?}"
    );

    let fast: serde_json::Value = client.get_json("slow/10").unwrap();
    assert_eq!(fast["slept_ms"], 10);
}

#[test]
fn refused_connection_is_transport_error() {
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let client = factory_for(Config::new(&format!("http://127.0.0.1:{port}")))
        .get_client()
        .unwrap();

    let err = client.products().unwrap_err();
    assert!(
        matches!(
            err,
            ApiError::Transport(TransportError::Connect(_) | TransportError::Io(_))
        ),
        "unexpected error: {err:?}"
    );
}

#[test]
fn expired_token_is_rejected_locally_and_remotely() {
    let factory = factory_for(Config::new(&format!("http://{}", start_server(-60))));
    let client = factory.get_client().unwrap();
    client.sign_in(EMAIL, PASSWORD).unwrap();

    assert_eq!(client.current_user().unwrap_err().status(), Some(401));
    assert!(matches!(
        client.validate_session(),
        Err(ApiError::Credential(CredentialError::Expired { .. }))
    ));
    assert!(!client.session().is_logged_in());
}

#[test]
fn file_session_survives_client_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let addr = start_server(3600);

    let factory = ClientFactory::new(
        Arc::new(Config::new(&format!("http://{addr}"))),
        Arc::new(SessionStore::open(FileBackend::new(&path))),
    );
    factory.get_client().unwrap().sign_in(EMAIL, PASSWORD).unwrap();

    let rebuilt = factory.reset_and_rebuild().unwrap();
    assert_eq!(rebuilt.current_user().unwrap().id, 1);

    let reopened = SessionStore::open(FileBackend::new(&path));
    assert!(reopened.is_logged_in());
    assert_eq!(reopened.email().as_deref(), Some(EMAIL));
}

#[test]
fn concurrent_get_client_shares_one_instance() {
    let factory = Arc::new(live_factory());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            std::thread::spawn(move || factory.get_client().unwrap())
        })
        .collect();
    let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for client in &clients[1..] {
        assert!(Arc::ptr_eq(&clients[0], client));
    }
}
