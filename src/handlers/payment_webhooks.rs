use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::payments::signature::{self, SIGNATURE_HEADER};
use crate::payments::WebhookEvent;
use crate::services::checkout::CheckoutOutcome;
use crate::{errors::ServiceError, AppState};

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body(content = String, description = "Raw provider event JSON", content_type = "application/json"),
    params(
        ("Stripe-Signature" = Option<String>, Header, description = "t=<unix>,v1=<hex HMAC-SHA256>")
    ),
    responses(
        (status = 200, description = "Event processed or already processed", body = WebhookAck),
        (status = 400, description = "Invalid signature or payload", body = crate::errors::ErrorResponse),
        (status = 500, description = "Processing failed; the provider should retry", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
#[instrument(skip_all, fields(event_id))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    match state.config.webhook_secret() {
        Some(secret) => {
            let header = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
            signature::verify(
                header,
                &body,
                secret,
                state.config.payment_webhook_tolerance_secs,
                chrono::Utc::now().timestamp(),
            )
            .map_err(|e| {
                warn!(error = %e, "Payment webhook signature verification failed");
                counter!("storefront_webhooks.rejected", 1, "reason" => "signature");
                ServiceError::WebhookSignature(e.to_string())
            })?;
        }
        None => debug!("No webhook secret configured; parsing payload unverified"),
    }

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Payment webhook body is not a valid event");
        counter!("storefront_webhooks.rejected", 1, "reason" => "payload");
        ServiceError::InvalidPayload(e.to_string())
    })?;

    tracing::Span::current().record("event_id", event.id.as_str());
    info!(event_type = %event.event_type, "Payment webhook received");

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            let session = event
                .checkout_session()
                .map_err(|e| ServiceError::InvalidPayload(format!("checkout session: {}", e)))?;

            match state.services.checkout.finalize(session).await {
                Ok(CheckoutOutcome::Created { order_id }) => {
                    counter!("storefront_webhooks.processed", 1, "type" => EVENT_CHECKOUT_COMPLETED, "outcome" => "created");
                    info!(%order_id, "Checkout finalized");
                }
                Ok(CheckoutOutcome::AlreadyProcessed { order_id }) => {
                    counter!("storefront_webhooks.processed", 1, "type" => EVENT_CHECKOUT_COMPLETED, "outcome" => "duplicate");
                    info!(%order_id, "Checkout already finalized");
                }
                Err(e) => {
                    counter!("storefront_webhooks.processed", 1, "type" => EVENT_CHECKOUT_COMPLETED, "outcome" => "failed");
                    error!(error = %e, "Checkout finalization failed");
                    return Err(ServiceError::InternalError(e.to_string()));
                }
            }
        }
        EVENT_PAYMENT_SUCCEEDED => {
            info!(payment_intent = ?event.object_id(), "Payment intent succeeded");
        }
        EVENT_PAYMENT_FAILED => {
            warn!(payment_intent = ?event.object_id(), "Payment intent failed");
        }
        other => {
            debug!(event_type = other, "Ignoring unhandled payment webhook type");
        }
    }

    Ok((StatusCode::OK, Json(WebhookAck { received: true })))
}
