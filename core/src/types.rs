//! DTOs for the marketplace backend.
//!
//! # Design
//! Field names follow the backend's snake_case JSON. Every date-typed field
//! is an `Option<DateTime<Utc>>` decoded through `dates::lenient`, so a date
//! the client cannot parse leaves the field empty instead of failing the
//! whole record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::dates;

/// Marketplace role of a user. Serialized lowercase; read case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Supermarket,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Supermarket => "supermarket",
            Role::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; the backend sends lowercase.
impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "supermarket" => Ok(Role::Supermarket),
            "consumer" => Ok(Role::Consumer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl LoginResponse {
    /// `"<token_type> <access_token>"`, the form sent in `Authorization`.
    pub fn full_token(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lon: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default, with = "dates::lenient")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_eco: bool,
    #[serde(default)]
    pub stock_available: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub shopping_list_id: Option<i64>,
    pub total_price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, with = "dates::lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "dates::lenient")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Payload for `POST transactions/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shopping_list_id: Option<i64>,
    pub total_price: f64,
    pub currency: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceabilityEvent {
    pub event: String,
    #[serde(default, with = "dates::lenient")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTraceability {
    pub product_id: i64,
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_eco: bool,
    #[serde(default)]
    pub producer_name: Option<String>,
    #[serde(default)]
    pub traceability_events: Vec<TraceabilityEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("FARMER".parse::<Role>(), Ok(Role::Farmer));
        assert_eq!(" supermarket ".parse::<Role>(), Ok(Role::Supermarket));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Consumer).unwrap(), r#""consumer""#);
    }

    #[test]
    fn role_deserializes_case_insensitively() {
        assert_eq!(serde_json::from_str::<Role>(r#""FARMER""#).unwrap(), Role::Farmer);
        assert_eq!(serde_json::from_str::<Role>(r#""Supermarket""#).unwrap(), Role::Supermarket);
        assert!(serde_json::from_str::<Role>(r#""admin""#).is_err());
        assert!(serde_json::from_str::<Role>("3").is_err());

        let profile: UserProfile = serde_json::from_str(
            r#"{"id":1,"name":"Jane","email":"j@f.org","role":"Consumer"}"#,
        )
        .unwrap();
        assert_eq!(profile.role, Role::Consumer);
    }

    #[test]
    fn login_response_defaults_token_type() {
        let resp: LoginResponse = serde_json::from_str(r#"{"access_token":"a.b.c"}"#).unwrap();
        assert_eq!(resp.full_token(), "bearer a.b.c");
    }

    #[test]
    fn register_request_omits_absent_location() {
        let req = RegisterRequest {
            name: "Jane".to_string(),
            email: "jane@farm.org".to_string(),
            password: "secret".to_string(),
            role: Role::Farmer,
            entity_name: None,
            location_lat: None,
            location_lon: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["role"], "farmer");
        assert!(json.get("location_lat").is_none());
    }

    #[test]
    fn transaction_with_unparseable_date_still_decodes() {
        let json = r#"{
            "id": 3,
            "user_id": 7,
            "total_price": 12.5,
            "created_at": "2025-09-06T21:35:55.818556",
            "confirmed_at": "06/09/2025"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.id, 3);
        assert_eq!(
            tx.created_at,
            Some(Utc.with_ymd_and_hms(2025, 9, 6, 21, 35, 55).unwrap() + chrono::Duration::microseconds(818_556))
        );
        assert_eq!(tx.confirmed_at, None);
        assert!(tx.items.is_empty());
    }

    #[test]
    fn missing_and_null_dates_are_absent() {
        let json = r#"{"event":"harvested","timestamp":null}"#;
        let event: TraceabilityEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.timestamp, None);

        let json = r#"{"event":"shipped"}"#;
        let event: TraceabilityEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.timestamp, None);
    }
}
