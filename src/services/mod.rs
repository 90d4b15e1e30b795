// Checkout finalization pipeline
pub mod checkout;
pub mod discounts;
pub mod financials;

// Cart and shipping-selection lifecycle
pub mod cart;
pub mod shipping_selection;

// Order reads
pub mod orders;
