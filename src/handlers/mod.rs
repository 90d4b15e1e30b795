pub mod orders;
pub mod payment_webhooks;
pub mod shipping;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::notifications::NotificationDispatcher;
use crate::payments::PaymentProvider;
use crate::services::{
    cart::CartService, checkout::CheckoutService, discounts::DiscountService,
    orders::OrderService, shipping_selection::ShippingSelectionService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub cart: CartService,
    pub shipping: ShippingSelectionService,
    pub discounts: DiscountService,
    pub checkout: CheckoutService,
    pub notifications: NotificationDispatcher,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        provider: Arc<dyn PaymentProvider>,
        notifications: NotificationDispatcher,
    ) -> Self {
        let orders = OrderService::new(db.clone());
        let cart = CartService::new(db.clone());
        let shipping = ShippingSelectionService::new(db.clone(), cart.clone());
        let discounts = DiscountService::new(db.clone(), provider.clone());
        let checkout = CheckoutService::new(
            db,
            config,
            provider,
            orders.clone(),
            cart.clone(),
            shipping.clone(),
            discounts.clone(),
            notifications.clone(),
        );

        Self {
            orders,
            cart,
            shipping,
            discounts,
            checkout,
            notifications,
        }
    }
}
