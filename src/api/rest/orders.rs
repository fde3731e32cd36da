use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{GeoPoint, Order, OrderItem, OrderStatus};
use crate::realtime::protocol::ServerEvent;
use crate::state::AppState;
use crate::store::{DeliverySummary, NewOrder};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/delivery", get(list_pending_orders))
        .route(
            "/orders/delivery/:partner_id/summary",
            get(partner_summary),
        )
        .route("/orders/farmer/:id", get(list_farmer_orders))
        .route("/orders/customer/:id", get(list_customer_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", patch(accept_order))
        .route("/orders/:id/complete", patch(complete_order))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub farmer_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub delivery_address: String,
    pub delivery_location: Option<GeoPoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRequest {
    pub delivery_partner_id: Option<Uuid>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let farmer_id = payload
        .farmer_id
        .ok_or_else(|| AppError::Validation("farmerId is required".to_string()))?;
    let customer_id = payload
        .customer_id
        .ok_or_else(|| AppError::Validation("customerId is required".to_string()))?;

    let order = state.store.create(NewOrder {
        farmer_id,
        customer_id,
        items: payload.items,
        total_amount: payload.total_amount,
        delivery_address: payload.delivery_address,
        delivery_location: payload.delivery_location,
    })?;

    state
        .metrics
        .order_transitions_total
        .with_label_values(&["created"])
        .inc();
    info!(order_id = %order.id, farmer_id = %farmer_id, "order created");

    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.store.get(id)?))
}

async fn list_farmer_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Order>> {
    Json(state.store.list_by_farmer(id))
}

async fn list_customer_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Order>> {
    Json(state.store.list_by_customer(id))
}

async fn list_pending_orders(State(state): State<Arc<AppState>>) -> Json<Vec<Order>> {
    Json(state.store.list_pending())
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerRequest>,
) -> Result<Json<Order>, AppError> {
    let partner_id = payload
        .delivery_partner_id
        .ok_or_else(|| AppError::Validation("deliveryPartnerId is required".to_string()))?;

    let order = state.store.accept(id, partner_id, state.delivery_fee)?;

    // Echoed only after the store write; the room hears the same truth a
    // fresh REST read would return.
    state.rooms.publish(
        order.id,
        ServerEvent::OrderAccepted {
            order_id: order.id,
            delivery_partner_id: partner_id,
        },
        None,
    );
    state.rooms.publish(
        order.id,
        ServerEvent::StatusUpdate {
            order_id: order.id,
            status: OrderStatus::Assigned,
        },
        None,
    );

    state
        .metrics
        .order_transitions_total
        .with_label_values(&["accepted"])
        .inc();
    info!(order_id = %order.id, partner_id = %partner_id, "order accepted");

    Ok(Json(order))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerRequest>,
) -> Result<Json<Order>, AppError> {
    let partner_id = payload
        .delivery_partner_id
        .ok_or_else(|| AppError::Validation("deliveryPartnerId is required".to_string()))?;

    let order = state.store.complete(id, partner_id)?;

    state.rooms.publish(
        order.id,
        ServerEvent::StatusUpdate {
            order_id: order.id,
            status: OrderStatus::Delivered,
        },
        None,
    );

    state
        .metrics
        .order_transitions_total
        .with_label_values(&["delivered"])
        .inc();
    info!(order_id = %order.id, partner_id = %partner_id, "order delivered");

    Ok(Json(order))
}

async fn partner_summary(
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<Uuid>,
) -> Json<DeliverySummary> {
    Json(state.store.partner_summary(partner_id))
}
