use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use storefront_api::notifications::{EmailMessage, HttpRelayMailer, Mailer, MailerError};
use storefront_api::payments::{
    PaymentProvider, PaymentProviderError, StripeClient, CHECKOUT_SESSION_EXPANSIONS,
};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> StripeClient {
    StripeClient::new(server.uri(), Some("sk_test_123".into()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn retrieves_expanded_checkout_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_1"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(query_param("expand[]", "line_items"))
        .and(query_param("expand[]", "total_details.breakdown"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "amount_total": 1275,
            "currency": "usd",
            "metadata": {"session_id": "cart_1"},
            "total_details": {"amount_discount": 225, "amount_shipping": 0, "amount_tax": 0},
            "line_items": {"object": "list", "has_more": false, "data": [{
                "id": "li_1",
                "quantity": 1,
                "amount_subtotal": 1500,
                "price": {"id": "price_1", "unit_amount": 1500}
            }]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server)
        .retrieve_checkout_session("cs_test_1", CHECKOUT_SESSION_EXPANSIONS)
        .await
        .unwrap();

    assert_eq!(session.id, "cs_test_1");
    assert_eq!(session.amount_total, Some(1275));
    assert_eq!(session.discount_cents(), Some(225));
    assert_eq!(session.metadata_value("session_id"), Some("cart_1"));
    assert_eq!(session.line_items.map(|l| l.data.len()), Some(1));
}

#[tokio::test]
async fn retrieves_promotion_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/promotion_codes/promo_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "promo_1",
            "object": "promotion_code",
            "code": "WELCOME15",
            "coupon": {"id": "co_15", "percent_off": 15.0}
        })))
        .mount(&server)
        .await;

    let code = client(&server).retrieve_promotion_code("promo_1").await.unwrap();
    assert_eq!(code.code, "WELCOME15");
    assert_eq!(code.coupon.and_then(|c| c.percent_off), Some(15.0));
}

#[tokio::test]
async fn surfaces_provider_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"type": "invalid_request_error", "message": "No such checkout.session: cs_missing"}
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .retrieve_checkout_session("cs_missing", &[])
        .await
        .unwrap_err();
    assert_matches!(
        err,
        PaymentProviderError::Api { status: 404, ref message } if message.contains("No such checkout.session")
    );
}

#[tokio::test]
async fn undecodable_body_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/promotion_codes/promo_bad"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .retrieve_promotion_code("promo_bad")
        .await
        .unwrap_err();
    assert_matches!(err, PaymentProviderError::Decode(_));
}

#[tokio::test]
async fn missing_api_key_short_circuits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = StripeClient::new(server.uri(), None, Duration::from_secs(5)).unwrap();
    assert!(!client.is_configured());
    let err = client.retrieve_promotion_code("promo_1").await.unwrap_err();
    assert_matches!(err, PaymentProviderError::NotConfigured);
}

fn message() -> EmailMessage {
    EmailMessage {
        to: "ada@example.com".into(),
        from: "orders@storefront.test".into(),
        subject: "Your order".into(),
        body: "Thanks!".into(),
        content_type: "text/plain; charset=utf-8".into(),
        order_data: json!({"order_id": "o_1"}),
    }
}

#[tokio::test]
async fn relay_mailer_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_partial_json(json!({"to": "ada@example.com", "subject": "Your order"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mailer =
        HttpRelayMailer::new(format!("{}/send", server.uri()), Duration::from_secs(5)).unwrap();
    mailer.send(&message()).await.unwrap();
}

#[tokio::test]
async fn relay_mailer_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mailer = HttpRelayMailer::new(server.uri(), Duration::from_secs(5)).unwrap();
    let err = mailer.send(&message()).await.unwrap_err();
    assert_matches!(err, MailerError::Rejected(503));
}
