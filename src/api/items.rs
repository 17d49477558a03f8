//! Item catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::item::{CreateItem, Item},
};

use super::AuthenticatedUser;

/// List all items with their current stock
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    responses(
        (status = 200, description = "Item list", body = Vec<Item>)
    )
)]
pub async fn list_items(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
) -> AppResult<Json<Vec<Item>>> {
    let items = state.services.items.list().await?;
    Ok(Json(items))
}

/// Get item by ID
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(("id" = Uuid, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item details", body = Item),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_caller): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let item = state.services.items.get_by_id(id).await?;
    Ok(Json(item))
}

/// Register a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid item", body = crate::error::ErrorResponse),
        (status = 409, description = "Item code already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(data): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    caller.require_staff()?;
    let item = state.services.items.create(data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
