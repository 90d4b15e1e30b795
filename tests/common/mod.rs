#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db,
    entities::cart_item,
    notifications::{EmailMessage, Mailer, MailerError},
    payments::{
        signature::{compute_signature, SIGNATURE_HEADER},
        CheckoutSession, PaymentProvider, PaymentProviderError, PromotionCode,
    },
    AppState,
};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const ADMIN_EMAIL: &str = "ops@storefront.test";

/// Payment provider double serving scripted sessions and promotion codes.
#[derive(Default)]
pub struct FakeProvider {
    sessions: Mutex<HashMap<String, Value>>,
    promotion_codes: Mutex<HashMap<String, Value>>,
    pub session_reads: AtomicUsize,
    pub promotion_code_reads: AtomicUsize,
}

impl FakeProvider {
    pub fn with_session(&self, id: &str, session: Value) {
        self.sessions
            .lock()
            .unwrap()
            .insert(id.to_string(), session);
    }

    pub fn with_promotion_code(&self, id: &str, code: Value) {
        self.promotion_codes
            .lock()
            .unwrap()
            .insert(id.to_string(), code);
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        _expand: &[&str],
    ) -> Result<CheckoutSession, PaymentProviderError> {
        self.session_reads.fetch_add(1, Ordering::SeqCst);
        let value = self.sessions.lock().unwrap().get(session_id).cloned();
        match value {
            Some(v) => serde_json::from_value(v)
                .map_err(|e| PaymentProviderError::Decode(e.to_string())),
            None => Err(PaymentProviderError::Api {
                status: 404,
                message: format!("No such checkout session: {}", session_id),
            }),
        }
    }

    async fn retrieve_promotion_code(
        &self,
        promotion_code_id: &str,
    ) -> Result<PromotionCode, PaymentProviderError> {
        self.promotion_code_reads.fetch_add(1, Ordering::SeqCst);
        let value = self
            .promotion_codes
            .lock()
            .unwrap()
            .get(promotion_code_id)
            .cloned();
        match value {
            Some(v) => serde_json::from_value(v)
                .map_err(|e| PaymentProviderError::Decode(e.to_string())),
            None => Err(PaymentProviderError::Api {
                status: 404,
                message: format!("No such promotion code: {}", promotion_code_id),
            }),
        }
    }
}

/// Mailer double that keeps every message it was asked to send. After
/// `reject_with` every send is recorded and then fails like a relay refusal.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    reject_status: Mutex<Option<u16>>,
}

impl RecordingMailer {
    pub fn reject_with(&self, status: u16) {
        *self.reject_status.lock().unwrap() = Some(status);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Polls until at least `count` messages arrived or the timeout elapses
    pub async fn wait_for(&self, count: usize) -> Vec<EmailMessage> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(message.clone());
        match *self.reject_status.lock().unwrap() {
            Some(status) => Err(MailerError::Rejected(status)),
            None => Ok(()),
        }
    }
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub mailer: Arc<RecordingMailer>,
    _workers: JoinHandle<()>,
}

impl TestApp {
    /// Unsigned webhooks accepted (no secret configured)
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Webhooks must carry a valid signature
    pub async fn with_webhook_secret() -> Self {
        Self::with_config(|cfg| cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string()))
            .await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // one connection so every query sees the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.admin_notification_email = Some(ADMIN_EMAIL.to_string());
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let provider = Arc::new(FakeProvider::default());
        let mailer = Arc::new(RecordingMailer::default());
        let (state, workers) = AppState::build(
            Arc::new(pool),
            Arc::new(cfg),
            provider.clone(),
            mailer.clone(),
        );
        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            provider,
            mailer,
            _workers: workers,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (u16, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };
        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        read_json(response).await
    }

    /// POSTs a raw webhook body, optionally with a signature header
    pub async fn post_webhook(&self, body: &str, signature: Option<String>) -> (u16, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        read_json(response).await
    }

    pub async fn post_event(&self, event: &Value) -> (u16, Value) {
        self.post_webhook(&event.to_string(), None).await
    }

    pub async fn add_cart_item(&self, session_id: &str, product_id: Uuid, quantity: i32, unit_price_cents: i64) {
        let now = Utc::now();
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id.to_string()),
            user_id: Set(None),
            product_id: Set(product_id),
            quantity: Set(quantity),
            unit_price_cents: Set(unit_price_cents),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed cart item");
    }
}

pub fn sign(body: &str, secret: &str) -> String {
    let ts = Utc::now().timestamp();
    let sig = compute_signature(secret, ts, body.as_bytes()).expect("hmac");
    format!("t={},v1={}", ts, sig)
}

async fn read_json(response: axum::response::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, value)
}

/// A product line whose price metadata carries the catalog product id
pub fn product_line(id: &str, product_id: Uuid, name: &str, quantity: i64, unit_amount: i64) -> Value {
    json!({
        "id": id,
        "description": name,
        "quantity": quantity,
        "amount_subtotal": unit_amount * quantity,
        "amount_total": unit_amount * quantity,
        "price": {
            "id": format!("price_{}", id),
            "unit_amount": unit_amount,
            "product": {
                "id": format!("prod_{}", id),
                "name": name,
                "metadata": {"product_id": product_id.to_string(), "sku": format!("SKU-{}", id)}
            }
        }
    })
}

/// Provider-side shipping line: no catalog product reference
pub fn shipping_line(amount: i64) -> Value {
    json!({
        "id": "li_shipping",
        "description": "Standard shipping",
        "quantity": 1,
        "amount_subtotal": amount,
        "amount_total": amount,
        "price": {"id": "price_shipping", "unit_amount": amount}
    })
}

/// Minimal completed checkout session with the given lines and totals
pub fn checkout_session(
    id: &str,
    cart_session_id: &str,
    lines: Vec<Value>,
    amount_total: i64,
    amount_tax: i64,
    amount_discount: i64,
) -> Value {
    json!({
        "id": id,
        "object": "checkout.session",
        "amount_total": amount_total,
        "currency": "usd",
        "customer": "cus_123",
        "customer_details": {
            "email": "ada@example.com",
            "name": "Ada Lovelace",
            "address": {"line1": "1 Analytical Way", "city": "London", "country": "GB"}
        },
        "payment_intent": "pi_123",
        "metadata": {"session_id": cart_session_id},
        "total_details": {
            "amount_discount": amount_discount,
            "amount_shipping": 0,
            "amount_tax": amount_tax
        },
        "line_items": {"object": "list", "data": lines, "has_more": false}
    })
}

pub fn event(event_type: &str, object: Value) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "object": "event",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "livemode": false,
        "data": {"object": object}
    })
}

pub fn completed(session: Value) -> Value {
    event("checkout.session.completed", session)
}
