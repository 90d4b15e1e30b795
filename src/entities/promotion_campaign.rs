use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A discount shape (e.g. "15% off"). Looked up by `name`, which is not enforced unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotion_campaigns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub discount_type: DiscountType,
    /// Whole percent, set for `Percentage` campaigns
    pub percent_off: Option<i32>,
    /// Minor units, set for `Amount` campaigns
    pub amount_off_cents: Option<i64>,
    pub external_coupon_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::promotion_code::Entity")]
    PromotionCodes,
}

impl Related<super::promotion_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromotionCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "amount")]
    Amount,
}
