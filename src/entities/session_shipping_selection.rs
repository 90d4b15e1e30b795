use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The live shipping quote for a cart session. One row per session.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "session_shipping_selections")]
#[schema(as = SessionShippingSelection)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub session_id: String,
    pub rate_id: String,
    pub carrier: String,
    pub service: String,
    pub shipping_cents: i64,
    pub delivery_days: Option<i32>,
    /// JSON-serialized cart snapshot taken when the quote was selected
    #[sea_orm(column_type = "Text")]
    pub cart_snapshot: String,
    pub status: SelectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    #[sea_orm(string_value = "quoted")]
    Quoted,
    #[sea_orm(string_value = "invalidated")]
    Invalidated,
    #[sea_orm(string_value = "consumed")]
    Consumed,
}
