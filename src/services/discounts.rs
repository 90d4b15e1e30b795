use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::entities::promotion_campaign::{
    self, DiscountType, Entity as PromotionCampaign, Model as PromotionCampaignModel,
};
use crate::entities::promotion_code::{self, Entity as PromotionCode, Model as PromotionCodeModel};
use crate::errors::ServiceError;
use crate::payments::types::{CheckoutSession, Coupon, Expandable};
use crate::payments::PaymentProvider;

/// Promotion attribution written onto an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPromotion {
    pub id: Uuid,
    pub code: String,
}

/// Magnitude of a discount as the provider describes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountShape {
    /// Whole percent
    Percentage(i32),
    /// Minor currency units
    Amount(i64),
}

impl DiscountShape {
    /// Classifies a provider coupon. Falls back to the charged discount when
    /// the coupon itself was not included in the payload.
    pub fn classify(coupon: Option<&Coupon>, charged_discount_cents: Option<i64>) -> Option<Self> {
        if let Some(coupon) = coupon {
            if let Some(percent) = coupon.percent_off.filter(|p| *p > 0.0) {
                return Some(Self::Percentage(percent.round() as i32));
            }
            if let Some(amount) = coupon.amount_off.filter(|a| *a > 0) {
                return Some(Self::Amount(amount));
            }
        }
        charged_discount_cents.filter(|d| *d > 0).map(Self::Amount)
    }

    pub fn campaign_name(&self) -> String {
        match self {
            Self::Percentage(pct) => format!("External — {}% Off", pct),
            Self::Amount(cents) => format!("External — ${} Off", Decimal::new(*cents, 2)),
        }
    }
}

/// A discount reference pulled out of a checkout session payload
#[derive(Debug, Clone)]
enum DiscountReference {
    /// The literal code string is already in the payload
    Code {
        code: String,
        external_id: Option<String>,
        coupon: Option<Coupon>,
    },
    /// Only the provider's opaque promotion-code id is known
    Opaque {
        external_id: String,
        coupon: Option<Coupon>,
    },
}

fn extract_reference(session: &CheckoutSession) -> Option<DiscountReference> {
    let from_breakdown = session
        .total_details
        .as_ref()
        .and_then(|t| t.breakdown.as_ref())
        .into_iter()
        .flat_map(|b| b.discounts.iter())
        .filter_map(|d| {
            d.discount
                .promotion_code
                .as_ref()
                .map(|pc| (pc, d.discount.coupon.clone()))
        });

    let from_session = session
        .discounts
        .iter()
        .flatten()
        .filter_map(|d| {
            d.promotion_code.as_ref().map(|pc| {
                let coupon = d.coupon.as_ref().and_then(Expandable::as_object).cloned();
                (pc, coupon)
            })
        });

    let (promotion_code, coupon) = from_breakdown.chain(from_session).next()?;

    Some(match promotion_code {
        Expandable::Object(pc) if !pc.code.trim().is_empty() => DiscountReference::Code {
            code: pc.code.trim().to_string(),
            external_id: Some(pc.id.clone()),
            coupon: pc.coupon.clone().or(coupon),
        },
        other => DiscountReference::Opaque {
            external_id: other.id().to_string(),
            coupon,
        },
    })
}

/// Resolves a checkout's discount to a local promotion code, creating the
/// campaign and code on first sight of an externally issued code.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
    provider: Arc<dyn PaymentProvider>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { db, provider }
    }

    /// Never fails: any problem is logged and the order goes ahead without a
    /// promotion reference, since the discount amount is already captured.
    #[instrument(skip_all, fields(checkout_session_id = %session.id))]
    pub async fn reconcile(
        &self,
        session: &CheckoutSession,
        discount_cents: Option<i64>,
    ) -> Option<AppliedPromotion> {
        match self.resolve(session, discount_cents).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "Discount reconciliation failed; recording order without promotion code");
                counter!("storefront_discounts.reconciliation_failures", 1);
                None
            }
        }
    }

    async fn resolve(
        &self,
        session: &CheckoutSession,
        discount_cents: Option<i64>,
    ) -> Result<Option<AppliedPromotion>, ServiceError> {
        let Some(reference) = extract_reference(session) else {
            if discount_cents.unwrap_or(0) > 0 {
                warn!(discount_cents, "Discount charged without a promotion code reference");
            }
            return Ok(None);
        };

        let (code, external_id, coupon) = match reference {
            DiscountReference::Code {
                code,
                external_id,
                coupon,
            } => (code, external_id, coupon),
            DiscountReference::Opaque {
                external_id,
                coupon,
            } => {
                debug!(%external_id, "Resolving promotion code from provider");
                let fetched = self.provider.retrieve_promotion_code(&external_id).await?;
                (
                    fetched.code.trim().to_string(),
                    Some(fetched.id),
                    fetched.coupon.or(coupon),
                )
            }
        };

        if code.is_empty() {
            warn!("Promotion code could not be resolved to a code string");
            return Ok(None);
        }

        if let Some(existing) = self.find_code(&code).await? {
            return Ok(Some(AppliedPromotion {
                id: existing.id,
                code: existing.code,
            }));
        }

        let shape = DiscountShape::classify(coupon.as_ref(), discount_cents).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "cannot derive a campaign for external code {}",
                code
            ))
        })?;
        let coupon_id = coupon.map(|c| c.id);

        let created = self
            .materialize_external_code(&code, external_id.as_deref(), shape, coupon_id.as_deref())
            .await?;
        Ok(Some(AppliedPromotion {
            id: created.id,
            code: created.code,
        }))
    }

    pub async fn find_code(&self, code: &str) -> Result<Option<PromotionCodeModel>, ServiceError> {
        Ok(PromotionCode::find()
            .filter(promotion_code::Column::Code.eq(code))
            .one(&*self.db)
            .await?)
    }

    /// Creates the local campaign/code pair for a code issued outside this
    /// system. Concurrent callers for the same code all receive the single
    /// row that won the insert.
    #[instrument(skip(self, shape), fields(campaign = %shape.campaign_name()))]
    pub async fn materialize_external_code(
        &self,
        code: &str,
        external_id: Option<&str>,
        shape: DiscountShape,
        coupon_id: Option<&str>,
    ) -> Result<PromotionCodeModel, ServiceError> {
        let campaign = self.find_or_create_campaign(shape, coupon_id).await?;

        let row = promotion_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            campaign_id: Set(campaign.id),
            code: Set(code.to_string()),
            external_id: Set(external_id.map(str::to_string)),
            is_external: Set(true),
            created_at: Set(Utc::now()),
        };

        match row.insert(&*self.db).await {
            Ok(created) => {
                info!(promotion_code_id = %created.id, "Materialized external promotion code");
                counter!("storefront_discounts.external_codes_created", 1);
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => {
                debug!("Lost promotion code insert race; re-reading winner");
                counter!("storefront_discounts.code_insert_races", 1);
                self.find_code(code).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "promotion code {} conflicted but could not be re-read",
                        code
                    ))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_or_create_campaign(
        &self,
        shape: DiscountShape,
        coupon_id: Option<&str>,
    ) -> Result<PromotionCampaignModel, ServiceError> {
        let name = shape.campaign_name();
        if let Some(existing) = PromotionCampaign::find()
            .filter(promotion_campaign::Column::Name.eq(name.as_str()))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let (discount_type, percent_off, amount_off_cents) = match shape {
            DiscountShape::Percentage(pct) => (DiscountType::Percentage, Some(pct), None),
            DiscountShape::Amount(cents) => (DiscountType::Amount, None, Some(cents)),
        };
        let campaign = promotion_campaign::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            discount_type: Set(discount_type),
            percent_off: Set(percent_off),
            amount_off_cents: Set(amount_off_cents),
            external_coupon_id: Set(coupon_id.map(str::to_string)),
            created_at: Set(Utc::now()),
        };
        let created = campaign.insert(&*self.db).await?;
        info!(campaign_id = %created.id, name = %created.name, "Created promotion campaign");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coupon(percent_off: Option<f64>, amount_off: Option<i64>) -> Coupon {
        Coupon {
            id: "co_1".into(),
            name: None,
            percent_off,
            amount_off,
            currency: Some("usd".into()),
        }
    }

    #[test]
    fn percentage_coupons_round_to_whole_percent() {
        let shape = DiscountShape::classify(Some(&coupon(Some(14.6), None)), Some(225));
        assert_eq!(shape, Some(DiscountShape::Percentage(15)));
        assert_eq!(shape.unwrap().campaign_name(), "External — 15% Off");
    }

    #[test]
    fn amount_coupons_name_in_major_units() {
        let shape = DiscountShape::classify(Some(&coupon(None, Some(500))), None);
        assert_eq!(shape, Some(DiscountShape::Amount(500)));
        assert_eq!(shape.unwrap().campaign_name(), "External — $5.00 Off");
    }

    #[test]
    fn missing_coupon_falls_back_to_charged_amount() {
        assert_eq!(
            DiscountShape::classify(None, Some(225)),
            Some(DiscountShape::Amount(225))
        );
        assert_eq!(DiscountShape::classify(None, Some(0)), None);
    }

    #[test]
    fn reference_prefers_literal_code_from_breakdown() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "total_details": {
                "amount_discount": 225,
                "breakdown": {"discounts": [{
                    "amount": 225,
                    "discount": {
                        "coupon": {"id": "co_1", "percent_off": 15.0},
                        "promotion_code": {"id": "promo_1", "code": "WELCOME15"}
                    }
                }]}
            }
        }))
        .unwrap();

        match extract_reference(&session) {
            Some(DiscountReference::Code {
                code,
                external_id,
                coupon,
            }) => {
                assert_eq!(code, "WELCOME15");
                assert_eq!(external_id.as_deref(), Some("promo_1"));
                assert_eq!(coupon.map(|c| c.id), Some("co_1".to_string()));
            }
            other => panic!("unexpected reference: {:?}", other),
        }
    }

    #[test]
    fn opaque_reference_from_session_discounts() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_1",
            "discounts": [{"coupon": "co_1", "promotion_code": "promo_9"}]
        }))
        .unwrap();

        match extract_reference(&session) {
            Some(DiscountReference::Opaque { external_id, coupon }) => {
                assert_eq!(external_id, "promo_9");
                assert!(coupon.is_none());
            }
            other => panic!("unexpected reference: {:?}", other),
        }
    }

    #[test]
    fn no_reference_without_promotion_code() {
        let session = CheckoutSession {
            id: "cs_1".into(),
            ..Default::default()
        };
        assert!(extract_reference(&session).is_none());
    }
}
