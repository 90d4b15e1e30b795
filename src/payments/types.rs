use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Webhook envelope. `data.object` is decoded lazily per event type.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub livemode: bool,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn checkout_session(&self) -> Result<CheckoutSession, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    /// Id of the embedded object, whatever its type
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }
}

/// Objects the provider identifies by an `id` field
pub trait ProviderObject {
    fn object_id(&self) -> &str;
}

/// A field the provider returns either as a bare id or, when expanded, as the
/// full object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: ProviderObject> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(obj) => obj.object_id(),
        }
    }
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(obj) => Some(obj.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct List<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub amount_subtotal: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<Expandable<Customer>>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
    #[serde(default)]
    pub payment_intent: Option<Expandable<PaymentIntent>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub total_details: Option<TotalDetails>,
    #[serde(default)]
    pub discounts: Option<Vec<SessionDiscount>>,
    #[serde(default)]
    pub line_items: Option<List<LineItem>>,
}

impl CheckoutSession {
    pub fn tax_cents(&self) -> Option<i64> {
        self.total_details.as_ref().map(|t| t.amount_tax)
    }

    pub fn discount_cents(&self) -> Option<i64> {
        self.total_details.as_ref().map(|t| t.amount_discount)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// A discount was charged but the payload carries no breakdown or code
    /// reference that would let us attribute it.
    pub fn missing_discount_breakdown(&self) -> bool {
        if self.discount_cents().unwrap_or(0) <= 0 {
            return false;
        }
        let breakdown_present = self
            .total_details
            .as_ref()
            .and_then(|t| t.breakdown.as_ref())
            .map(|b| !b.discounts.is_empty())
            .unwrap_or(false);
        let session_discount_present = self
            .discounts
            .as_ref()
            .map(|d| d.iter().any(|d| d.promotion_code.is_some()))
            .unwrap_or(false);
        !breakdown_present && !session_discount_present
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|c| c.email.as_deref())
            .or_else(|| {
                self.customer
                    .as_ref()
                    .and_then(Expandable::as_object)
                    .and_then(|c| c.email.as_deref())
            })
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .or_else(|| {
                self.customer
                    .as_ref()
                    .and_then(Expandable::as_object)
                    .and_then(|c| c.name.as_deref())
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProviderObject for Customer {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentIntent {
    pub id: String,
}

impl ProviderObject for PaymentIntent {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Address {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TotalDetails {
    #[serde(default)]
    pub amount_discount: i64,
    #[serde(default)]
    pub amount_shipping: i64,
    #[serde(default)]
    pub amount_tax: i64,
    #[serde(default)]
    pub breakdown: Option<TotalDetailsBreakdown>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TotalDetailsBreakdown {
    #[serde(default)]
    pub discounts: Vec<DiscountAmount>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscountAmount {
    pub amount: i64,
    pub discount: Discount,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Discount {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub coupon: Option<Coupon>,
    #[serde(default)]
    pub promotion_code: Option<Expandable<PromotionCode>>,
}

/// Entry of the session-level `discounts` array
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionDiscount {
    #[serde(default)]
    pub coupon: Option<Expandable<Coupon>>,
    #[serde(default)]
    pub promotion_code: Option<Expandable<PromotionCode>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Coupon {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub percent_off: Option<f64>,
    #[serde(default)]
    pub amount_off: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl ProviderObject for Coupon {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromotionCode {
    pub id: String,
    /// Customer-facing literal code; may be absent on partially expanded payloads
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub coupon: Option<Coupon>,
}

impl ProviderObject for PromotionCode {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub amount_subtotal: Option<i64>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub price: Option<Price>,
}

impl LineItem {
    /// Looks a key up on the expanded product first, then on the price
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        let price = self.price.as_ref()?;
        price
            .product
            .as_ref()
            .and_then(Expandable::as_object)
            .and_then(|p| p.metadata.get(key))
            .or_else(|| price.metadata.get(key))
            .map(String::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn product_name(&self) -> Option<&str> {
        self.price
            .as_ref()
            .and_then(|p| p.product.as_ref())
            .and_then(Expandable::as_object)
            .and_then(|p| p.name.as_deref())
            .or(self.description.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub product: Option<Expandable<Product>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderObject for Product {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expandable_accepts_id_or_object() {
        let id: Expandable<PromotionCode> = serde_json::from_value(json!("promo_123")).unwrap();
        assert_eq!(id.id(), "promo_123");
        assert!(id.as_object().is_none());

        let obj: Expandable<PromotionCode> =
            serde_json::from_value(json!({"id": "promo_123", "code": "WELCOME15"})).unwrap();
        assert_eq!(obj.id(), "promo_123");
        assert_eq!(obj.as_object().map(|p| p.code.as_str()), Some("WELCOME15"));
    }

    #[test]
    fn missing_breakdown_only_matters_when_discounted() {
        let mut session = CheckoutSession {
            id: "cs_1".into(),
            total_details: Some(TotalDetails {
                amount_discount: 225,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(session.missing_discount_breakdown());

        session.total_details = Some(TotalDetails::default());
        assert!(!session.missing_discount_breakdown());
    }

    #[test]
    fn line_item_metadata_prefers_product() {
        let item: LineItem = serde_json::from_value(json!({
            "id": "li_1",
            "quantity": 1,
            "price": {
                "id": "price_1",
                "metadata": {"product_id": "from-price"},
                "product": {"id": "prod_1", "name": "Mug", "metadata": {"product_id": "from-product"}}
            }
        }))
        .unwrap();
        assert_eq!(item.metadata_value("product_id"), Some("from-product"));
        assert_eq!(item.product_name(), Some("Mug"));
    }
}
