use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront checkout API

Turns payment-provider checkout webhooks into orders.

- **Webhook**: `checkout.session.completed` creates at most one order per checkout session.
  Deliveries are verified against the `Stripe-Signature` header when a webhook secret is configured.
- **Shipping selections**: the quoted rate for a cart session. A selection is only honoured while
  the cart still matches the snapshot taken when it was quoted.
- **Orders**: read back the order created for a checkout session.

## Error Handling

```json
{
  "error": "Bad Request",
  "message": "Invalid webhook signature: no v1 signature matched",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Payments", description = "Payment provider webhooks"),
        (name = "Shipping", description = "Shipping selection lifecycle"),
        (name = "Orders", description = "Finalized orders"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::shipping::put_selection,
        crate::handlers::shipping::get_selection,
        crate::handlers::orders::get_order_by_checkout_session,
        crate::health_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::handlers::payment_webhooks::WebhookAck,
            crate::services::shipping_selection::QuoteShippingRequest,
            crate::services::shipping_selection::CartSnapshot,
            crate::services::shipping_selection::SnapshotItem,
            crate::services::orders::OrderDetails,
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order_item::Model,
            crate::entities::order_shipping_selection::Model,
            crate::entities::session_shipping_selection::Model,
            crate::entities::session_shipping_selection::SelectionStatus,
            crate::HealthResponse,
        )
    )
)]
pub struct ApiDocV1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDocV1::openapi();
        for path in [
            "/api/v1/payments/webhook",
            "/api/v1/shipping/selections/{session_id}",
            "/api/v1/orders/by-checkout-session/{checkout_session_id}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
