use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::types::{CheckoutSession, PromotionCode};
use super::{PaymentProvider, PaymentProviderError};
use crate::config::AppConfig;

/// REST client for the provider's read endpoints.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl StripeClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentProviderError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PaymentProviderError> {
        Self::new(
            config.payment_api_base_url.clone(),
            config.payment_api_key.clone(),
            config.payment_request_timeout(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PaymentProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(PaymentProviderError::NotConfigured)?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "payment provider request");

        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(status, &body);
            warn!(status = status.as_u16(), %message, "payment provider request failed");
            return Err(PaymentProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| PaymentProviderError::Decode(e.to_string()))
    }
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match (parsed.error.kind, parsed.error.message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message),
            (None, Some(message)) => message,
            (Some(kind), None) => kind,
            (None, None) => status.to_string(),
        },
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self))]
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        expand: &[&str],
    ) -> Result<CheckoutSession, PaymentProviderError> {
        let query: Vec<(&str, &str)> = expand.iter().map(|field| ("expand[]", *field)).collect();
        self.get(&format!("/v1/checkout/sessions/{}", session_id), &query)
            .await
    }

    #[instrument(skip(self))]
    async fn retrieve_promotion_code(
        &self,
        promotion_code_id: &str,
    ) -> Result<PromotionCode, PaymentProviderError> {
        self.get(&format!("/v1/promotion_codes/{}", promotion_code_id), &[])
            .await
    }
}
