use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Redeemable code. `code` is UNIQUE at the storage layer; concurrent
/// materialization of the same external code relies on that constraint.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotion_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub campaign_id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    /// Payment provider promotion-code id
    pub external_id: Option<String>,
    /// Created lazily from a webhook rather than by the issuance flow
    pub is_external: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::promotion_campaign::Entity",
        from = "Column::CampaignId",
        to = "super::promotion_campaign::Column::Id"
    )]
    Campaign,
}

impl Related<super::promotion_campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
