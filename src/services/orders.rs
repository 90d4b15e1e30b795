use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{self, Entity as Order, Model as OrderModel};
use crate::entities::order_item::{self, Entity as OrderItem, Model as OrderItemModel};
use crate::entities::order_shipping_selection::{
    self, Entity as OrderShippingSelection, Model as OrderShippingSelectionModel,
};
use crate::errors::ServiceError;

/// A finalized order with its lines and shipping record
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetails {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    pub shipping_selection: Option<OrderShippingSelectionModel>,
}

/// Read access to finalized orders
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Idempotency lookup keyed by the provider's checkout session id
    #[instrument(skip(self))]
    pub async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::CheckoutSessionId.eq(checkout_session_id))
            .one(&*self.db)
            .await?)
    }

    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn details_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self
            .find_by_checkout_session(checkout_session_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No order for checkout session {}",
                    checkout_session_id
                ))
            })?;

        let items = self.items(order.id).await?;
        let shipping_selection = OrderShippingSelection::find()
            .filter(order_shipping_selection::Column::OrderId.eq(order.id))
            .one(&*self.db)
            .await?;

        Ok(OrderDetails {
            order,
            items,
            shipping_selection,
        })
    }
}
