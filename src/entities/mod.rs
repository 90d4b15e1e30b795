//! Storage entities for the checkout finalization pipeline
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod order_shipping_selection;
pub mod promotion_campaign;
pub mod promotion_code;
pub mod session_shipping_selection;

pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_shipping_selection::{
    Entity as OrderShippingSelection, Model as OrderShippingSelectionModel,
};
pub use promotion_campaign::{DiscountType, Entity as PromotionCampaign, Model as PromotionCampaignModel};
pub use promotion_code::{Entity as PromotionCode, Model as PromotionCodeModel};
pub use session_shipping_selection::{
    Entity as SessionShippingSelection, Model as SessionShippingSelectionModel, SelectionStatus,
};
