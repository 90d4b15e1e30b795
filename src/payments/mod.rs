//! Payment provider integration: payload types, the follow-up read client and
//! webhook signature verification.

pub mod signature;
pub mod stripe;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use stripe::StripeClient;
pub use types::{CheckoutSession, PromotionCode, WebhookEvent};

/// Expansions requested when a `checkout.session.completed` payload arrives
/// without its line items or discount breakdown.
pub const CHECKOUT_SESSION_EXPANSIONS: &[&str] = &[
    "line_items",
    "line_items.data.price.product",
    "total_details.breakdown",
    "discounts.promotion_code",
];

#[derive(Debug, Error)]
pub enum PaymentProviderError {
    #[error("payment provider is not configured")]
    NotConfigured,

    #[error("payment provider transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode payment provider response: {0}")]
    Decode(String),
}

/// Synchronous reads against the payment provider used while finalizing a
/// checkout.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        expand: &[&str],
    ) -> Result<CheckoutSession, PaymentProviderError>;

    async fn retrieve_promotion_code(
        &self,
        promotion_code_id: &str,
    ) -> Result<PromotionCode, PaymentProviderError>;
}
