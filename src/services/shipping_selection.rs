use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order_shipping_selection::{self, Model as OrderShippingSelectionModel};
use crate::entities::session_shipping_selection::{
    self, Entity as SessionShippingSelection, Model as SessionShippingSelectionModel,
    SelectionStatus,
};
use crate::errors::ServiceError;
use crate::services::cart::CartService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SnapshotItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Content fingerprint of a cart: its (product, quantity) pairs and total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartSnapshot {
    pub items: Vec<SnapshotItem>,
    pub total_cents: i64,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Equal totals, equal line counts, and every stored pair present in
    /// `current`. Line order is irrelevant.
    pub fn matches(&self, current: &CartSnapshot) -> bool {
        self.total_cents == current.total_cents
            && self.items.len() == current.items.len()
            && self.items.iter().all(|stored| {
                current.items.iter().any(|live| {
                    live.product_id == stored.product_id && live.quantity == stored.quantity
                })
            })
    }
}

/// Shipping quote the customer picked for their cart
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QuoteShippingRequest {
    #[validate(length(min = 1, max = 128))]
    pub rate_id: String,
    #[validate(length(min = 1, max = 64))]
    pub carrier: String,
    #[validate(length(min = 1, max = 128))]
    pub service: String,
    #[validate(range(min = 0))]
    pub shipping_cents: i64,
    #[validate(range(min = 0, max = 365))]
    pub delivery_days: Option<i32>,
}

/// Quote, validate and consume per-session shipping selections.
#[derive(Clone)]
pub struct ShippingSelectionService {
    db: Arc<DatabaseConnection>,
    cart: CartService,
}

impl ShippingSelectionService {
    pub fn new(db: Arc<DatabaseConnection>, cart: CartService) -> Self {
        Self { db, cart }
    }

    /// Records a quote together with a snapshot of the live cart. A later
    /// quote for the same session supersedes this one.
    #[instrument(skip(self, request), fields(rate_id = %request.rate_id))]
    pub async fn quote(
        &self,
        session_id: &str,
        request: QuoteShippingRequest,
    ) -> Result<SessionShippingSelectionModel, ServiceError> {
        request.validate()?;

        let snapshot = self.cart.snapshot(session_id).await?;
        if snapshot.is_empty() {
            return Err(ServiceError::BadRequest(
                "Cannot quote shipping for an empty cart".to_string(),
            ));
        }

        let now = Utc::now();
        let selection = session_shipping_selection::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id.to_string()),
            rate_id: Set(request.rate_id),
            carrier: Set(request.carrier),
            service: Set(request.service),
            shipping_cents: Set(request.shipping_cents),
            delivery_days: Set(request.delivery_days),
            cart_snapshot: Set(serde_json::to_string(&snapshot)?),
            status: Set(SelectionStatus::Quoted),
            created_at: Set(now),
            updated_at: Set(now),
        };

        SessionShippingSelection::insert(selection)
            .on_conflict(
                OnConflict::column(session_shipping_selection::Column::SessionId)
                    .update_columns([
                        session_shipping_selection::Column::RateId,
                        session_shipping_selection::Column::Carrier,
                        session_shipping_selection::Column::Service,
                        session_shipping_selection::Column::ShippingCents,
                        session_shipping_selection::Column::DeliveryDays,
                        session_shipping_selection::Column::CartSnapshot,
                        session_shipping_selection::Column::Status,
                        session_shipping_selection::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        info!(items = snapshot.items.len(), total_cents = snapshot.total_cents, "Shipping quote recorded");

        self.find(session_id)
            .await?
            .ok_or_else(|| ServiceError::InternalError("shipping selection vanished after upsert".into()))
    }

    pub async fn find(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionShippingSelectionModel>, ServiceError> {
        Ok(SessionShippingSelection::find()
            .filter(session_shipping_selection::Column::SessionId.eq(session_id))
            .one(&*self.db)
            .await?)
    }

    /// Returns the session's selection only while its snapshot still matches
    /// the live cart. A mismatch marks the stored row invalidated.
    #[instrument(skip(self))]
    pub async fn find_valid(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionShippingSelectionModel>, ServiceError> {
        let Some(selection) = self.find(session_id).await? else {
            return Ok(None);
        };
        if selection.status != SelectionStatus::Quoted {
            return Ok(None);
        }

        let stored = match serde_json::from_str::<CartSnapshot>(&selection.cart_snapshot) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Stored cart snapshot is unreadable");
                None
            }
        };
        let current = self.cart.snapshot(session_id).await?;

        if stored.is_some_and(|stored| stored.matches(&current)) {
            return Ok(Some(selection));
        }

        if self.invalidate(&selection).await? {
            info!(selection_id = %selection.id, "Cart changed since shipping quote; selection invalidated");
            counter!("storefront_shipping.selections_invalidated", 1);
        }
        Ok(None)
    }

    /// Moves a quoted selection to `invalidated`. Returns false when the row
    /// already left `quoted` (for example, consumed by a concurrent checkout).
    pub async fn invalidate(
        &self,
        selection: &SessionShippingSelectionModel,
    ) -> Result<bool, ServiceError> {
        leave_quoted(&*self.db, selection.id, SelectionStatus::Invalidated).await
    }

    /// Copies a validated selection onto the order and retires the session row.
    #[instrument(skip(self, selection), fields(selection_id = %selection.id))]
    pub async fn consume(
        &self,
        selection: SessionShippingSelectionModel,
        order_id: Uuid,
    ) -> Result<OrderShippingSelectionModel, ServiceError> {
        let record = order_shipping_selection::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            source_selection_id: Set(selection.id),
            rate_id: Set(selection.rate_id.clone()),
            carrier: Set(selection.carrier.clone()),
            service: Set(selection.service.clone()),
            shipping_cents: Set(selection.shipping_cents),
            delivery_days: Set(selection.delivery_days),
            created_at: Set(Utc::now()),
        };
        let record = record.insert(&*self.db).await?;

        if !leave_quoted(&*self.db, selection.id, SelectionStatus::Consumed).await? {
            warn!(%order_id, "Shipping selection left the quoted state before it was consumed");
        }
        Ok(record)
    }
}

/// Status change guarded on the row still being `quoted`, so a stale reader
/// never overwrites a terminal state.
async fn leave_quoted<C: ConnectionTrait>(
    db: &C,
    selection_id: Uuid,
    status: SelectionStatus,
) -> Result<bool, ServiceError> {
    let result = SessionShippingSelection::update_many()
        .col_expr(session_shipping_selection::Column::Status, Expr::value(status))
        .col_expr(session_shipping_selection::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(session_shipping_selection::Column::Id.eq(selection_id))
        .filter(session_shipping_selection::Column::Status.eq(SelectionStatus::Quoted))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}
