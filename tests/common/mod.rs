#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

/// One request received by the mock gateway.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// How the mock gateway answers.
#[derive(Debug, Clone)]
pub struct Behavior {
    pub initialize_http: StatusCode,
    pub initialize_status: &'static str,
    pub verify_http: StatusCode,
    pub verify_status: &'static str,
    pub verify_data_status: &'static str,
    pub delay: Duration,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            initialize_http: StatusCode::OK,
            initialize_status: "success",
            verify_http: StatusCode::OK,
            verify_status: "success",
            verify_data_status: "success",
            delay: Duration::ZERO,
        }
    }
}

/// In-process stand-in for the payment provider's HTTP API.
#[derive(Clone, Default)]
pub struct MockGateway {
    behavior: Arc<Mutex<Behavior>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl MockGateway {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            recorded: Arc::default(),
        }
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    fn behavior(&self) -> Behavior {
        self.behavior.lock().unwrap().clone()
    }

    fn record(&self, path: String, headers: &HeaderMap, body: Value) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.recorded.lock().unwrap().push(Recorded {
            path,
            authorization,
            body,
        });
    }

    /// Binds to an ephemeral port and returns the API base URL.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/v1/transaction/initialize", post(initialize))
            .route("/v1/transaction/verify/{tx_ref}", get(verify))
            .route("/v1/transaction/cancel/{tx_ref}", put(cancel))
            .route("/v1/subaccount", post(subaccount))
            .route("/v1/currency_supported", get(currencies))
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }
}

async fn initialize(
    State(mock): State<MockGateway>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let behavior = mock.behavior();
    tokio::time::sleep(behavior.delay).await;
    let tx_ref = body["tx_ref"].as_str().unwrap_or_default().to_string();
    mock.record("/transaction/initialize".to_string(), &headers, body);

    let envelope = if behavior.initialize_status == "success" {
        json!({
            "status": "success",
            "message": "Hosted Link",
            "data": { "checkout_url": format!("https://checkout.chapa.test/checkout/payment/{tx_ref}") }
        })
    } else {
        json!({ "status": behavior.initialize_status, "message": "Invalid API Key", "data": null })
    };
    (behavior.initialize_http, Json(envelope))
}

async fn verify(
    State(mock): State<MockGateway>,
    Path(tx_ref): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let behavior = mock.behavior();
    tokio::time::sleep(behavior.delay).await;
    mock.record(format!("/transaction/verify/{tx_ref}"), &headers, Value::Null);

    let envelope = json!({
        "status": behavior.verify_status,
        "message": "Payment details",
        "data": { "status": behavior.verify_data_status, "tx_ref": tx_ref, "amount": "500.00",
                  "reference": "APfY8x1Qz" }
    });
    (behavior.verify_http, Json(envelope))
}

async fn cancel(
    State(mock): State<MockGateway>,
    Path(tx_ref): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    mock.record(format!("/transaction/cancel/{tx_ref}"), &headers, Value::Null);
    (
        StatusCode::OK,
        Json(json!({ "status": "success", "message": "Transaction cancelled successfully" })),
    )
}

async fn subaccount(
    State(mock): State<MockGateway>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let account = body["account_number"].as_str().unwrap_or_default().to_string();
    mock.record("/subaccount".to_string(), &headers, body);
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Subaccount created successfully",
            "data": { "id": format!("sub-{account}") }
        })),
    )
}

async fn currencies(State(mock): State<MockGateway>, headers: HeaderMap) -> Json<Value> {
    mock.record("/currency_supported".to_string(), &headers, Value::Null);
    Json(json!({
        "status": "success",
        "message": "Supported currencies",
        "data": [
            { "name": "Ethiopian Birr", "code": "ETB" },
            { "name": "US Dollar", "code": "USD" }
        ]
    }))
}

/// Users t1 (tenant), t2 (tenant), l1 (landlord); house h1; bookings
/// b1 (approved), b2 (pending), b3 (rejected).
pub const FIXTURES: &str = r#"{
    "users": [
        { "user_id": "t1", "email": "abebe@example.com", "full_name": "Abebe Kebede",
          "phone_number": "0911000000", "role": "tenant", "created_at": "2026-01-01T00:00:00Z" },
        { "user_id": "t2", "email": "sara@example.com", "full_name": "Sara Tadesse",
          "role": "tenant", "created_at": "2026-01-01T00:00:00Z" },
        { "user_id": "l1", "email": "almaz@example.com", "full_name": "Almaz Haile",
          "role": "landlord", "created_at": "2026-01-01T00:00:00Z" }
    ],
    "houses": [
        { "house_id": "h1", "landlord_id": "l1", "title": "Two bedroom near the stadium",
          "location": "Woliso", "price_per_month": "4500", "status": "available" }
    ],
    "bookings": [
        { "booking_id": "b1", "tenant_id": "t1", "house_id": "h1", "landlord_id": "l1",
          "status": "approved", "requested_at": "2026-01-02T00:00:00Z" },
        { "booking_id": "b2", "tenant_id": "t2", "house_id": "h1", "landlord_id": "l1",
          "status": "pending", "requested_at": "2026-01-02T00:00:00Z" },
        { "booking_id": "b3", "tenant_id": "t2", "house_id": "h1", "landlord_id": "l1",
          "status": "rejected", "requested_at": "2026-01-02T00:00:00Z" }
    ]
}"#;

pub fn fixtures_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(FIXTURES.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
