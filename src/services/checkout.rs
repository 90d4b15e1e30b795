use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::is_unique_violation;
use crate::entities::order::{self, Model as OrderModel, OrderStatus};
use crate::entities::order_item::{self, Model as OrderItemModel};
use crate::entities::session_shipping_selection::Model as SessionShippingSelectionModel;
use crate::errors::ServiceError;
use crate::notifications::NotificationDispatcher;
use crate::payments::types::{Address, CheckoutSession, LineItem};
use crate::payments::{PaymentProvider, CHECKOUT_SESSION_EXPANSIONS};
use crate::services::cart::CartService;
use crate::services::discounts::DiscountService;
use crate::services::financials::{self, ProviderTotals};
use crate::services::orders::OrderService;
use crate::services::shipping_selection::ShippingSelectionService;

/// Metadata key carrying the storefront cart session id
pub const METADATA_SESSION_ID: &str = "session_id";
/// Metadata key carrying the signed-in user's id, when there is one
pub const METADATA_USER_ID: &str = "user_id";
/// Line-item (product or price) metadata key carrying the catalog product id
pub const METADATA_PRODUCT_ID: &str = "product_id";
pub const METADATA_SKU: &str = "sku";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Created { order_id: Uuid },
    /// An order for this checkout session already existed
    AlreadyProcessed { order_id: Uuid },
}

/// Converts a completed checkout session into an order, at most once per
/// session.
///
/// The order row, its shipping record, its items and the cart clear are
/// separate writes. An item write failing after the order row exists leaves
/// the order in place, and later deliveries treat it as already processed.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
    provider: Arc<dyn PaymentProvider>,
    orders: OrderService,
    cart: CartService,
    shipping: ShippingSelectionService,
    discounts: DiscountService,
    notifications: NotificationDispatcher,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        provider: Arc<dyn PaymentProvider>,
        orders: OrderService,
        cart: CartService,
        shipping: ShippingSelectionService,
        discounts: DiscountService,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            config,
            provider,
            orders,
            cart,
            shipping,
            discounts,
            notifications,
        }
    }

    #[instrument(skip_all, fields(checkout_session_id = %session.id))]
    pub async fn finalize(&self, session: CheckoutSession) -> Result<CheckoutOutcome, ServiceError> {
        if let Some(existing) = self.orders.find_by_checkout_session(&session.id).await? {
            info!(order_id = %existing.id, "Checkout session already finalized");
            counter!("storefront_checkout.duplicate_deliveries", 1, "stage" => "lookup");
            return Ok(CheckoutOutcome::AlreadyProcessed {
                order_id: existing.id,
            });
        }

        let session = self.complete_session(session).await?;
        let cart_session_id = session.metadata_value(METADATA_SESSION_ID).map(str::to_string);
        let user_id = session
            .metadata_value(METADATA_USER_ID)
            .and_then(|v| Uuid::parse_str(v).ok());

        let selection = match cart_session_id.as_deref() {
            Some(sid) => self.valid_shipping_selection(sid).await,
            None => {
                debug!("Checkout session carries no cart session id");
                None
            }
        };

        let totals = ProviderTotals {
            total_cents: session.amount_total,
            tax_cents: session.tax_cents(),
            discount_cents: session.discount_cents(),
        };
        let amounts = financials::reconcile(&totals, selection.as_ref().map(|s| s.shipping_cents));

        let promotion = self.discounts.reconcile(&session, amounts.discount_cents).await;

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            checkout_session_id: Set(session.id.clone()),
            cart_session_id: Set(cart_session_id.clone()),
            user_id: Set(user_id),
            customer_id: Set(session.customer.as_ref().map(|c| c.id().to_string())),
            customer_email: Set(session.customer_email().map(str::to_string)),
            customer_name: Set(session.customer_name().map(str::to_string)),
            shipping_name: Set(session.shipping_details.as_ref().and_then(|s| s.name.clone())),
            shipping_address: Set(address_json(
                session.shipping_details.as_ref().and_then(|s| s.address.as_ref()),
            )?),
            billing_address: Set(address_json(
                session.customer_details.as_ref().and_then(|c| c.address.as_ref()),
            )?),
            currency: Set(session
                .currency
                .clone()
                .unwrap_or_else(|| self.config.default_currency.clone())
                .to_lowercase()),
            subtotal_cents: Set(amounts.subtotal_cents),
            tax_cents: Set(amounts.tax_cents),
            shipping_cents: Set(amounts.shipping_cents),
            total_cents: Set(amounts.total_cents),
            original_subtotal_cents: Set(amounts.original_subtotal_cents),
            discount_cents: Set(amounts.discount_cents),
            promotion_code_id: Set(promotion.as_ref().map(|p| p.id)),
            promotion_code: Set(promotion.map(|p| p.code)),
            payment_intent_id: Set(session.payment_intent.as_ref().map(|p| p.id().to_string())),
            status: Set(OrderStatus::Received),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let order = match order.insert(&*self.db).await {
            Ok(order) => order,
            Err(e) if is_unique_violation(&e) => {
                // a concurrent delivery won the insert
                counter!("storefront_checkout.duplicate_deliveries", 1, "stage" => "insert");
                let existing = self
                    .orders
                    .find_by_checkout_session(&session.id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "order insert conflicted but no order was found".to_string(),
                        )
                    })?;
                info!(order_id = %existing.id, "Checkout session finalized concurrently");
                return Ok(CheckoutOutcome::AlreadyProcessed {
                    order_id: existing.id,
                });
            }
            Err(e) => return Err(e.into()),
        };
        info!(order_id = %order.id, total_cents = order.total_cents, "Order created");

        if let Some(selection) = selection {
            self.shipping.consume(selection, order.id).await?;
        }

        let items = self.persist_items(&order, &session).await?;

        if let Err(e) = self.cart.clear(cart_session_id.as_deref(), user_id).await {
            warn!(order_id = %order.id, error = %e, "Failed to clear cart after checkout");
        }

        counter!("storefront_checkout.orders_created", 1);
        self.notifications.order_finalized(&order, &items);

        Ok(CheckoutOutcome::Created { order_id: order.id })
    }

    /// Re-reads the session with expansions when the webhook payload omitted
    /// line items or the discount breakdown. Only missing line items are fatal.
    async fn complete_session(
        &self,
        session: CheckoutSession,
    ) -> Result<CheckoutSession, ServiceError> {
        let needs_items = session.line_items.is_none();
        let needs_breakdown = session.missing_discount_breakdown();
        if !needs_items && !needs_breakdown {
            return Ok(session);
        }

        debug!(needs_items, needs_breakdown, "Fetching expanded checkout session");
        match self
            .provider
            .retrieve_checkout_session(&session.id, CHECKOUT_SESSION_EXPANSIONS)
            .await
        {
            Ok(mut expanded) => {
                if expanded.metadata.is_empty() {
                    expanded.metadata = session.metadata;
                }
                Ok(expanded)
            }
            Err(e) if needs_items => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Could not expand discount breakdown; continuing with webhook payload");
                Ok(session)
            }
        }
    }

    async fn valid_shipping_selection(
        &self,
        cart_session_id: &str,
    ) -> Option<SessionShippingSelectionModel> {
        match self.shipping.find_valid(cart_session_id).await {
            Ok(Some(selection)) => Some(selection),
            Ok(None) => {
                warn!(cart_session_id, "No valid shipping selection for checkout; shipping recorded as zero");
                counter!("storefront_checkout.missing_shipping_selection", 1);
                None
            }
            Err(e) => {
                warn!(cart_session_id, error = %e, "Shipping selection lookup failed; shipping recorded as zero");
                counter!("storefront_checkout.missing_shipping_selection", 1);
                None
            }
        }
    }

    async fn persist_items(
        &self,
        order: &OrderModel,
        session: &CheckoutSession,
    ) -> Result<Vec<OrderItemModel>, ServiceError> {
        let lines = session
            .line_items
            .as_ref()
            .map(|list| list.data.as_slice())
            .unwrap_or_default();

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(row) = order_item_for(order.id, line) else {
                debug!(line_item_id = %line.id, "Skipping line item without a product reference");
                continue;
            };
            items.push(row.insert(&*self.db).await?);
        }

        if items.len() != lines.len() {
            info!(
                order_id = %order.id,
                persisted = items.len(),
                skipped = lines.len() - items.len(),
                "Skipped non-product line items"
            );
        }
        Ok(items)
    }
}

fn address_json(address: Option<&Address>) -> Result<Option<String>, ServiceError> {
    address
        .map(serde_json::to_string)
        .transpose()
        .map_err(ServiceError::from)
}

/// Maps a provider line item to an order item. Lines without a catalog
/// product id (for example provider-side shipping lines) yield `None`.
fn order_item_for(order_id: Uuid, line: &LineItem) -> Option<order_item::ActiveModel> {
    let product_id = line
        .metadata_value(METADATA_PRODUCT_ID)
        .and_then(|v| Uuid::parse_str(v).ok())?;

    let quantity = line.quantity.unwrap_or(1);
    let quantity_i32 = match i32::try_from(quantity) {
        Ok(q) if q > 0 => q,
        _ => {
            warn!(line_item_id = %line.id, %product_id, quantity, "Dropping product line with unusable quantity");
            return None;
        }
    };

    let unit_price_cents = line
        .price
        .as_ref()
        .and_then(|p| p.unit_amount)
        .or_else(|| line.amount_subtotal.map(|s| s / quantity))
        .unwrap_or(0);
    let line_total_cents = line
        .amount_subtotal
        .unwrap_or_else(|| unit_price_cents.saturating_mul(quantity));

    let product_name = line
        .product_name()
        .map(str::to_string)
        .unwrap_or_else(|| "Item".to_string());

    Some(order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(product_id),
        product_name: Set(product_name),
        sku: Set(line.metadata_value(METADATA_SKU).map(str::to_string)),
        quantity: Set(quantity_i32),
        unit_price_cents: Set(unit_price_cents),
        line_total_cents: Set(line_total_cents),
        created_at: Set(Utc::now()),
    })
}
