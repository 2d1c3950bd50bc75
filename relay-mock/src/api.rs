use crate::state::{MockState, StoredProof};
use axum::extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State};
use axum::http::{StatusCode, header, request::Parts};
use axum::routing::{get, post};
use axum::{Json, Router};
use shared::client::SessionUser;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::{
    CancelOrderRequest, CreateOrderRequest, ExploreQuery, Order, OrderAction, OrderIdRequest,
    OrderQuery, ProofQuery,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the proof file
const PROOF_FIELD: &str = "proof";
const MAX_PROOF_SIZE: usize = 5 * 1024 * 1024;

pub fn router(state: Arc<MockState>) -> Router {
    let upload_routes = Router::new()
        .route("/api/orders/upload-proof", post(upload_proof))
        .layer(DefaultBodyLimit::max(MAX_PROOF_SIZE + 64 * 1024));

    Router::new()
        .route("/api/orders/create", post(create_order))
        .route("/api/orders/my-orders", get(my_orders))
        .route("/api/orders/my-accepted-orders", get(my_accepted_orders))
        .route("/api/orders/explore", get(explore))
        .route("/api/orders/accept", post(accept))
        .route("/api/orders/cancel", post(cancel))
        .route("/api/orders/cancel-acceptance", post(cancel_acceptance))
        .route("/api/orders/confirm-payment", post(confirm_payment))
        .route("/api/orders/confirm-delivery", post(confirm_delivery))
        .route("/api/orders/{id}", get(get_order))
        .route("/health", get(health))
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ========== Auth ==========

/// Caller resolved from the bearer token
pub struct CurrentUser(pub SessionUser);

impl FromRequestParts<Arc<MockState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<MockState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim);

        match token.and_then(|t| state.authenticate(t)) {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!(uri = %parts.uri, "Rejected request without a known token");
                Err(AppError::unauthorized())
            }
        }
    }
}

// ========== Handlers ==========

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_order(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let order = state.create(&user, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn my_orders(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OrderQuery>,
) -> Json<Vec<Order>> {
    Json(state.orders_created_by(&user, &query).await)
}

async fn my_accepted_orders(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<OrderQuery>,
) -> Json<Vec<Order>> {
    Json(state.orders_accepted_by(&user, &query).await)
}

/// The feed is wrapped in `{ "orders": [...] }`
async fn explore(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ExploreQuery>,
) -> Json<serde_json::Value> {
    let orders = state.explore(&user, &query).await;
    Json(serde_json::json!({ "orders": orders }))
}

async fn get_order(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let order = state.order(&user, &id).await?;
    Ok(Json(serde_json::json!({ "order": order })))
}

async fn accept(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<OrderIdRequest>,
) -> AppResult<Json<Order>> {
    transition(&state, &user, &req.order_id, OrderAction::Accept, None).await
}

async fn cancel(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CancelOrderRequest>,
) -> AppResult<Json<Order>> {
    transition(&state, &user, &req.order_id, OrderAction::Cancel, req.reason).await
}

async fn cancel_acceptance(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CancelOrderRequest>,
) -> AppResult<Json<Order>> {
    transition(
        &state,
        &user,
        &req.order_id,
        OrderAction::CancelAcceptance,
        req.reason,
    )
    .await
}

async fn confirm_payment(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<OrderIdRequest>,
) -> AppResult<Json<Order>> {
    transition(&state, &user, &req.order_id, OrderAction::ConfirmPayment, None).await
}

async fn confirm_delivery(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<OrderIdRequest>,
) -> AppResult<Json<Order>> {
    transition(&state, &user, &req.order_id, OrderAction::ConfirmDelivery, None).await
}

/// POST /api/orders/upload-proof?orderId=... with a multipart `proof` file
async fn upload_proof(
    State(state): State<Arc<MockState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ProofQuery>,
    mut multipart: Multipart,
) -> AppResult<Json<Order>> {
    let mut proof: Option<StoredProof> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::with_message(ErrorCode::InvalidRequest, format!("Multipart error: {e}"))
    })? {
        if field.name() != Some(PROOF_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("proof").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            AppError::with_message(ErrorCode::InvalidRequest, format!("Read error: {e}"))
        })?;

        if data.len() > MAX_PROOF_SIZE {
            return Err(AppError::with_message(
                ErrorCode::InvalidRequest,
                format!("File too large: {} bytes (max {MAX_PROOF_SIZE})", data.len()),
            ));
        }
        proof = Some(StoredProof {
            file_name,
            content_type,
            size: data.len(),
        });
        break;
    }

    let proof = proof.ok_or_else(|| AppError::new(ErrorCode::ProofMissing))?;
    let order = state.upload_proof(&user, &query.order_id, proof).await?;
    Ok(Json(order))
}

async fn transition(
    state: &MockState,
    user: &SessionUser,
    order_id: &str,
    action: OrderAction,
    reason: Option<String>,
) -> AppResult<Json<Order>> {
    let order = state.transition(user, order_id, action, reason).await?;
    Ok(Json(order))
}
