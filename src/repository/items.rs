//! Items repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::violates;
use crate::{
    error::{AppError, AppResult},
    models::item::Item,
};

const ITEMS_CODE_KEY: &str = "items_code_key";

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get item by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Get several items at once (missing IDs are skipped)
    pub async fn get_many(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// List all items by name
    pub async fn list(&self) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY name, code")
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Create an item
    pub async fn create(&self, item: &Item) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (id, code, name, condition, stock, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.condition)
        .bind(item.stock)
        .bind(item.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, ITEMS_CODE_KEY) {
                AppError::Conflict(format!("Item code {} already exists", item.code))
            } else {
                AppError::Database(e)
            }
        })
    }
}
