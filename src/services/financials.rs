use serde::Serialize;

/// Totals as reported by the payment provider. Absent values count as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderTotals {
    pub total_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub discount_cents: Option<i64>,
}

/// Order amounts derived from the provider totals and the quoted shipping cost.
///
/// `total = subtotal + tax + shipping` always holds; when a discount applied,
/// `subtotal + discount = original_subtotal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Financials {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub discount_cents: Option<i64>,
    pub original_subtotal_cents: Option<i64>,
}

pub fn reconcile(totals: &ProviderTotals, quoted_shipping_cents: Option<i64>) -> Financials {
    let total_cents = totals.total_cents.unwrap_or(0);
    let shipping_cents = quoted_shipping_cents.unwrap_or(0);
    let tax_cents = totals.tax_cents.unwrap_or(0);
    let subtotal_cents = total_cents - tax_cents - shipping_cents;

    let discount_cents = totals.discount_cents.filter(|d| *d > 0);
    let original_subtotal_cents = discount_cents.map(|d| subtotal_cents + d);

    Financials {
        subtotal_cents,
        tax_cents,
        shipping_cents,
        total_cents,
        discount_cents,
        original_subtotal_cents,
    }
}
