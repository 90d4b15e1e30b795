use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::entities::SessionShippingSelectionModel;
use crate::errors::ServiceError;
use crate::services::shipping_selection::QuoteShippingRequest;
use crate::{ApiResponse, ApiResult, AppState};

pub fn shipping_routes() -> Router<AppState> {
    Router::new().route(
        "/shipping/selections/:session_id",
        get(get_selection).put(put_selection),
    )
}

/// Record the shipping rate picked for a cart session
#[utoipa::path(
    put,
    path = "/api/v1/shipping/selections/{session_id}",
    params(("session_id" = String, Path, description = "Cart session id")),
    request_body = QuoteShippingRequest,
    responses(
        (status = 200, description = "Selection recorded", body = ApiResponse<SessionShippingSelectionModel>),
        (status = 400, description = "Empty cart or invalid quote", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipping"
)]
#[instrument(skip(state, request))]
pub async fn put_selection(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<QuoteShippingRequest>,
) -> ApiResult<SessionShippingSelectionModel> {
    let selection = state.services.shipping.quote(&session_id, request).await?;
    Ok(Json(ApiResponse::success(selection)))
}

/// Fetch the session's selection if the cart still matches the quote
#[utoipa::path(
    get,
    path = "/api/v1/shipping/selections/{session_id}",
    params(("session_id" = String, Path, description = "Cart session id")),
    responses(
        (status = 200, description = "Selection still valid", body = ApiResponse<SessionShippingSelectionModel>),
        (status = 404, description = "No selection, or the cart changed since it was quoted", body = crate::errors::ErrorResponse)
    ),
    tag = "Shipping"
)]
#[instrument(skip(state))]
pub async fn get_selection(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionShippingSelectionModel> {
    state
        .services
        .shipping
        .find_valid(&session_id)
        .await?
        .map(|selection| Json(ApiResponse::success(selection)))
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "No valid shipping selection for session {}",
                session_id
            ))
        })
}
