//! Lendable item (asset) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Item record from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: Uuid,
    /// Inventory code, unique per item
    pub code: String,
    pub name: String,
    /// Physical condition label (e.g. "good", "worn")
    pub condition: String,
    /// Units on the shelf. Never negative.
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.stock > 0
    }
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 64))]
    pub condition: Option<String>,
    #[validate(range(min = 0, max = 100000))]
    pub stock: i32,
}

impl CreateItem {
    pub fn into_item(self, now: DateTime<Utc>) -> Item {
        Item {
            id: Uuid::new_v4(),
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            condition: self
                .condition
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "good".to_string()),
            stock: self.stock,
            created_at: now,
        }
    }
}
