//! Business logic services

pub mod items;
pub mod loans;

use std::sync::Arc;

use crate::repository::LendingStore;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub items: items::ItemsService,
    pub loans: loans::LoansService,
    store: Arc<dyn LendingStore>,
}

impl Services {
    /// Create all services over the given store
    pub fn new(store: Arc<dyn LendingStore>) -> Self {
        Self {
            items: items::ItemsService::new(store.clone()),
            loans: loans::LoansService::new(store.clone()),
            store,
        }
    }

    /// Store reachability, for readiness checks
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.store.ping().await
    }
}
