use axum::{
    Json, Router,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    errors::{OrderError, ValidationError},
    orders::{Order, OrderCreate, OrderUpdate},
    state::AppState,
};

/// Errors returned to HTTP callers as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        tracing::warn!(error = %e, "rejected order payload");
        ApiError::Validation(e.to_string())
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            e @ OrderError::InvalidTimestamp(_) => ApiError::Validation(e.to_string()),
            OrderError::Repository(e) => {
                tracing::error!(error = %e, "order storage failed");
                ApiError::Internal("storage unavailable".to_string())
            }
        }
    }
}

/// `Json` that answers malformed bodies with a logged 422 in our error shape.
pub struct LoggedJson<T>(pub T);

impl<S, T> FromRequest<S> for LoggedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(LoggedJson(value)),
            Err(rejection) => {
                tracing::warn!(error = %rejection.body_text(), "bad json body");
                Err(ApiError::Validation(rejection.body_text()))
            }
        }
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list()?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    state.orders.get(&id)?.map(Json).ok_or(ApiError::NotFound)
}

pub async fn create_order(
    State(state): State<AppState>,
    LoggedJson(payload): LoggedJson<OrderCreate>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    payload.validate()?;
    let order = state.orders.create(payload)?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    LoggedJson(payload): LoggedJson<OrderUpdate>,
) -> Result<Json<Order>, ApiError> {
    payload.validate()?;
    state
        .orders
        .update(&id, payload)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.orders.delete(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

pub fn router(state: AppState) -> Router {
    let orders = Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", orders)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
