//! Item catalog service

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::item::{CreateItem, Item},
    repository::LendingStore,
};

#[derive(Clone)]
pub struct ItemsService {
    store: Arc<dyn LendingStore>,
}

impl ItemsService {
    pub fn new(store: Arc<dyn LendingStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Item>> {
        self.store.list_items().await
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or(AppError::ItemNotFound(id))
    }

    /// Register a new item with its initial stock
    pub async fn create(&self, data: CreateItem) -> AppResult<Item> {
        data.validate()?;
        let item = self.store.create_item(&data.into_item(Utc::now())).await?;
        tracing::info!(item_id = %item.id, code = %item.code, stock = item.stock, "Item created");
        Ok(item)
    }
}
