use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::cart_item::{self, Entity as CartItem};
use crate::errors::ServiceError;
use crate::services::shipping_selection::{CartSnapshot, SnapshotItem};

/// Read/clear access to the live cart. Cart mutation lives elsewhere.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Snapshot of the cart's current contents and total
    #[instrument(skip(self))]
    pub async fn snapshot(&self, session_id: &str) -> Result<CartSnapshot, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::SessionId.eq(session_id))
            .all(&*self.db)
            .await?;

        let total_cents = rows
            .iter()
            .map(|row| row.unit_price_cents * i64::from(row.quantity))
            .sum();
        let items = rows
            .into_iter()
            .map(|row| SnapshotItem {
                product_id: row.product_id,
                quantity: row.quantity,
            })
            .collect();

        Ok(CartSnapshot { items, total_cents })
    }

    /// Removes every line belonging to the session or the signed-in user.
    /// Returns the number of deleted rows.
    #[instrument(skip(self))]
    pub async fn clear(
        &self,
        session_id: Option<&str>,
        user_id: Option<Uuid>,
    ) -> Result<u64, ServiceError> {
        if session_id.is_none() && user_id.is_none() {
            return Ok(0);
        }

        let mut condition = Condition::any();
        if let Some(session_id) = session_id {
            condition = condition.add(cart_item::Column::SessionId.eq(session_id));
        }
        if let Some(user_id) = user_id {
            condition = condition.add(cart_item::Column::UserId.eq(user_id));
        }

        let result = CartItem::delete_many()
            .filter(condition)
            .exec(&*self.db)
            .await?;

        info!(rows = result.rows_affected, "Cleared cart");
        Ok(result.rows_affected)
    }
}
