use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use dojo_types::{
    ExpiredOrder, Item, ItemRequest, Order, OrderStatus, OrderTransitionRequest, PlaceOrderRequest,
};

use super::{in_use_or_internal, parse_id, ApiError, ApiResult};
use crate::db::repositories::{ItemRepository, OrderRepository};
use crate::jobs;
use crate::middleware::RequestUserContext;
use crate::state::AppState;
use crate::validation::non_blank;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

fn validate_item(payload: &ItemRequest) -> ApiResult<()> {
    if non_blank(&payload.name).is_none() {
        return Err(ApiError::BadRequest("Item name is required.".to_string()));
    }
    if payload.price_cents.is_some_and(|p| p < 0) {
        return Err(ApiError::BadRequest("Price cannot be negative.".to_string()));
    }
    if payload.stock.is_some_and(|s| s < 0) {
        return Err(ApiError::BadRequest("Stock cannot be negative.".to_string()));
    }
    Ok(())
}

fn load_item(state: &AppState, item_id: &Uuid) -> ApiResult<Item> {
    ItemRepository::new(state.db.pool.clone())
        .get_by_id(item_id)?
        .ok_or_else(|| ApiError::NotFound("Item not found".to_string()))
}

fn load_order(state: &AppState, order_id: &Uuid) -> ApiResult<Order> {
    OrderRepository::new(state.db.pool.clone())
        .get_by_id(order_id)?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))
}

/// GET /items - Catalog (students only see items in stock)
pub async fn list_items(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Item>>> {
    let user = ctx.require_user()?;
    let items = ItemRepository::new(state.db.pool.clone())
        .list(!user.is_staff())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(items))
}

/// GET /items/:id
pub async fn get_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> ApiResult<Json<Item>> {
    ctx.require_user()?;
    let item_id = parse_id(&item_id, "item")?;
    Ok(Json(load_item(&state, &item_id)?))
}

/// POST /items - Add an item to the catalog (staff)
pub async fn create_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<ItemRequest>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    ctx.require_staff()?;
    validate_item(&payload)?;
    let item = ItemRepository::new(state.db.pool.clone()).create(&payload)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /items/:id - Update an item (staff)
pub async fn update_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(payload): Json<ItemRequest>,
) -> ApiResult<Json<Item>> {
    ctx.require_staff()?;
    let item_id = parse_id(&item_id, "item")?;
    validate_item(&payload)?;
    if !ItemRepository::new(state.db.pool.clone()).update(&item_id, &payload)? {
        return Err(ApiError::NotFound("Item not found".to_string()));
    }
    Ok(Json(load_item(&state, &item_id)?))
}

/// DELETE /items/:id - Remove an item (staff); items with orders are kept
pub async fn delete_item(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> ApiResult<StatusCode> {
    ctx.require_staff()?;
    let item_id = parse_id(&item_id, "item")?;
    let deleted = ItemRepository::new(state.db.pool.clone())
        .delete(&item_id)
        .map_err(|e| in_use_or_internal(e, "This item has orders and cannot be deleted."))?;
    if !deleted {
        return Err(ApiError::NotFound("Item not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /orders - Order an item, reserving the stock (student)
pub async fn place_order(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Json(payload): Json<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let student = ctx.require_student()?;
    let order = OrderRepository::new(state.db.pool.clone()).place_order(
        &student.id,
        &payload.item_id,
        payload.quantity,
    )?;
    tracing::info!(
        "Order {} placed by {} for {} x {}",
        order.id,
        student.id,
        order.quantity,
        order.item_name
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/mine - Own orders, newest first
pub async fn my_orders(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    let user = ctx.require_user()?;
    let orders = OrderRepository::new(state.db.pool.clone()).list(Some(&user.id), query.status, None, None)?;
    Ok(Json(orders))
}

/// GET /orders?status= - All orders (staff)
pub async fn list_orders(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    ctx.require_staff()?;
    let orders = OrderRepository::new(state.db.pool.clone()).list(None, query.status, None, None)?;
    Ok(Json(orders))
}

/// GET /orders/:id - A single order (owner or staff)
pub async fn get_order(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    let user = ctx.require_user()?;
    let order_id = parse_id(&order_id, "order")?;
    let order = load_order(&state, &order_id)?;
    if !user.is_staff() && order.student_id != user.id {
        return Err(ApiError::NotFound("Order not found".to_string()));
    }
    Ok(Json(order))
}

/// POST /orders/:id/transition - Move an order through its lifecycle
///
/// Owners may only cancel their own orders; every other move is staff work.
pub async fn transition_order(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(payload): Json<OrderTransitionRequest>,
) -> ApiResult<Json<Order>> {
    let user = ctx.require_user()?;
    let order_id = parse_id(&order_id, "order")?;
    let order = load_order(&state, &order_id)?;

    if payload.status == OrderStatus::Cancelled {
        if order.student_id != user.id {
            return Err(ApiError::Forbidden("Only the owner can cancel an order.".to_string()));
        }
    } else if !user.is_staff() {
        return Err(ApiError::Forbidden("Staff only".to_string()));
    }

    let order = OrderRepository::new(state.db.pool.clone()).transition(
        &order_id,
        payload.status,
        &user.id,
        payload.reason.as_deref(),
    )?;
    tracing::info!("Order {} moved to {} by {}", order.id, order.status.as_str(), user.id);
    Ok(Json(order))
}

/// POST /orders/expire - Run the pending-order expiration now (admin)
pub async fn expire_orders(
    Extension(ctx): Extension<RequestUserContext>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ExpiredOrder>>> {
    ctx.require_admin()?;
    let expired = jobs::expire_pending_orders(&state.db, state.settings.orders.expiration_days)?;
    Ok(Json(expired))
}
