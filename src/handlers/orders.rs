use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::services::orders::OrderDetails;
use crate::{ApiResponse, ApiResult, AppState};

pub fn order_routes() -> Router<AppState> {
    Router::new().route(
        "/orders/by-checkout-session/:checkout_session_id",
        get(get_order_by_checkout_session),
    )
}

/// Look up the order created for a checkout session. Returns 404 until the
/// checkout webhook has been processed.
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-checkout-session/{checkout_session_id}",
    params(("checkout_session_id" = String, Path, description = "Payment provider checkout session id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderDetails>),
        (status = 404, description = "Order not created yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
#[instrument(skip(state))]
pub async fn get_order_by_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
) -> ApiResult<OrderDetails> {
    let details = state
        .services
        .orders
        .details_by_checkout_session(&checkout_session_id)
        .await?;
    Ok(Json(ApiResponse::success(details)))
}
