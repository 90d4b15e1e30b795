use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One row per finalized checkout session.
///
/// `total_cents = subtotal_cents + tax_cents + shipping_cents`, and when a
/// discount applied `subtotal_cents + discount_cents = original_subtotal_cents`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// External checkout session id; UNIQUE, enforces idempotency
    #[sea_orm(unique)]
    pub checkout_session_id: String,
    /// Cart session the checkout originated from
    pub cart_session_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub shipping_name: Option<String>,
    /// Denormalized JSON address as collected by the provider
    #[sea_orm(column_type = "Text", nullable)]
    pub shipping_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub billing_address: Option<String>,
    pub currency: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub original_subtotal_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub promotion_code_id: Option<Uuid>,
    pub promotion_code: Option<String>,
    pub payment_intent_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_one = "super::order_shipping_selection::Entity")]
    ShippingSelection,
    #[sea_orm(
        belongs_to = "super::promotion_code::Entity",
        from = "Column::PromotionCodeId",
        to = "super::promotion_code::Column::Id"
    )]
    PromotionCode,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_shipping_selection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingSelection.def()
    }
}

impl Related<super::promotion_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromotionCode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle status. This pipeline only ever writes `Received`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}
