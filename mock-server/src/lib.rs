use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const DEMO_EMAIL: &str = "maria@example.com";
pub const DEMO_PASSWORD: &str = "password123";
pub const DEMO_QR_HASH: &str = "qr-7f3a9c";
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub entity_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub entity_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// In-memory backend state. Transactions are kept as raw JSON so seeded
/// records can carry dates in the mixed shapes the real backend emits.
pub struct Backend {
    users: HashMap<i64, User>,
    transactions: Vec<Value>,
    next_user_id: i64,
    token_ttl_secs: i64,
}

pub type Db = Arc<RwLock<Backend>>;

type ApiError = (StatusCode, Json<Value>);

impl Backend {
    fn seeded(token_ttl_secs: i64) -> Self {
        let maria = User {
            id: 1,
            name: "María López".to_string(),
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
            role: "farmer".to_string(),
            entity_name: Some("Huerta La Vega".to_string()),
        };
        let transactions = vec![
            json!({
                "id": 1, "user_id": 1, "total_price": 18.4, "currency": "EUR",
                "status": "confirmed", "payment_method": "card",
                "created_at": "2025-09-06T21:35:55.818556",
                "confirmed_at": "2025-09-06 21:40:00",
                "items": [{"id": 3, "name": "Tomate rosa", "price": 4.6, "quantity": 4, "unit": "kg"}]
            }),
            json!({
                "id": 2, "user_id": 1, "total_price": 6.0, "currency": "EUR",
                "status": "pending", "payment_method": "cash",
                "created_at": "2025-09-07",
                "confirmed_at": "07/09/2025",
                "items": []
            }),
        ];
        Self {
            users: HashMap::from([(maria.id, maria)]),
            transactions,
            next_user_id: 2,
            token_ttl_secs,
        }
    }

    fn issue_token(&self, user: &User) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(
            json!({
                "sub": user.id.to_string(),
                "email": user.email,
                "role": user.role,
                "name": user.name,
                "exp": Utc::now().timestamp() + self.token_ttl_secs,
            })
            .to_string(),
        );
        let signature = URL_SAFE_NO_PAD.encode("mock-signature");
        format!("{header}.{payload}.{signature}")
    }

    /// Resolve the bearer token in `headers` to a user. Signatures are not
    /// checked; expiry is.
    fn authenticate(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| unauthorized("Not authenticated"))?;

        let payload = token
            .split('.')
            .nth(1)
            .and_then(|p| URL_SAFE_NO_PAD.decode(p).ok())
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
            .ok_or_else(|| unauthorized("Could not validate credentials"))?;

        let exp = payload["exp"].as_i64().unwrap_or(0);
        if Utc::now().timestamp() >= exp {
            return Err(unauthorized("Token expired"));
        }
        payload["sub"]
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|id| self.users.get(&id).cloned())
            .ok_or_else(|| unauthorized("Could not validate credentials"))
    }
}

fn unauthorized(detail: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail })))
}

pub fn app() -> Router {
    app_with_token_ttl(DEFAULT_TOKEN_TTL_SECS)
}

/// Like `app`, but tokens expire `ttl_secs` after issue (may be negative).
pub fn app_with_token_ttl(ttl_secs: i64) -> Router {
    let db: Db = Arc::new(RwLock::new(Backend::seeded(ttl_secs)));
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/echo-headers", get(echo_headers))
        .route("/echo-headers", get(echo_headers))
        .route("/users/me", get(current_user))
        .route("/products/", get(list_products))
        .route("/transactions/", get(list_transactions).post(create_transaction))
        .route("/traceability/product/{qr_hash}", get(product_traceability))
        .route("/catalog/large", get(large_catalog))
        .route("/slow/{millis}", get(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, app()).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, app).await
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<Token>, ApiError> {
    let db = db.read().await;
    let user = db
        .users
        .values()
        .find(|u| u.email == input.email && u.password == input.password)
        .ok_or_else(|| unauthorized("Invalid credentials"))?;
    tracing::info!(user_id = user.id, "login");
    Ok(Json(Token {
        access_token: db.issue_token(user),
        token_type: "bearer".to_string(),
    }))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut db = db.write().await;
    if db.users.values().any(|u| u.email == input.email) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Email already registered" })),
        ));
    }
    let id = db.next_user_id;
    db.next_user_id += 1;
    let user = User {
        id,
        name: input.name,
        email: input.email,
        password: input.password,
        role: input.role,
        entity_name: input.entity_name,
    };
    let body = json!({ "id": user.id, "email": user.email });
    db.users.insert(id, user);
    Ok(Json(body))
}

async fn echo_headers(headers: HeaderMap) -> Json<HashMap<String, String>> {
    Json(
        headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect(),
    )
}

async fn current_user(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let user = db.read().await.authenticate(&headers)?;
    Ok(Json(json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
        "entity_name": user.entity_name,
        "created_at": "2025-09-06T21:35:55.818556",
    })))
}

fn catalog() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Lechuga romana", "price": 1.5, "category": "verdura", "is_eco": true, "stock_available": 40}),
        json!({"id": 2, "name": "Miel de azahar", "price": 7.25, "category": "despensa", "is_eco": false, "stock_available": 12}),
        json!({"id": 3, "name": "Tomate rosa", "price": 4.6, "category": "verdura", "is_eco": true, "stock_available": 0}),
    ]
}

async fn list_products(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<Value>>, ApiError> {
    db.read().await.authenticate(&headers)?;
    Ok(Json(catalog()))
}

async fn list_transactions(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, ApiError> {
    let db = db.read().await;
    let user = db.authenticate(&headers)?;
    Ok(Json(
        db.transactions
            .iter()
            .filter(|t| t["user_id"].as_i64() == Some(user.id))
            .cloned()
            .collect(),
    ))
}

async fn create_transaction(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut db = db.write().await;
    let user = db.authenticate(&headers)?;
    let id = db.transactions.len() as i64 + 1;

    let mut record = input;
    let Some(fields) = record.as_object_mut() else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "expected a JSON object" })),
        ));
    };
    fields.insert("id".to_string(), json!(id));
    fields.insert("user_id".to_string(), json!(user.id));
    fields.insert("status".to_string(), json!("pending"));
    fields.insert(
        "created_at".to_string(),
        json!(Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
    );
    db.transactions.push(record.clone());
    Ok((StatusCode::CREATED, Json(record)))
}

async fn product_traceability(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(qr_hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
    db.read().await.authenticate(&headers)?;
    if qr_hash != DEMO_QR_HASH {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "detail": "Product not found" }))));
    }
    Ok(Json(json!({
        "product_id": 3,
        "product_name": "Tomate rosa",
        "category": "verdura",
        "is_eco": true,
        "producer_name": "María López",
        "traceability_events": [
            {"event": "harvested", "timestamp": "2025-09-01 07:15:00", "location": "Huerta La Vega"},
            {"event": "packed", "timestamp": "2025-09-01T10:02:11.250", "location": "Almacén Norte"},
            {"event": "delivered", "timestamp": "1 de septiembre", "location": "Mercado Central"}
        ]
    })))
}

/// More than 10KB of JSON with multi-byte characters.
async fn large_catalog() -> Json<Vec<Value>> {
    Json(
        (0..200)
            .map(|i| {
                json!({
                    "id": i,
                    "name": format!("Pimiento de Padrón nº{i} · cosecha 🌶️"),
                    "description": "Ecológico, kilómetro cero, recogido a mano en Galicia.",
                    "price": 2.95,
                    "is_eco": true
                })
            })
            .collect(),
    )
}

async fn slow(Path(millis): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json(json!({ "slept_ms": millis }))
}
