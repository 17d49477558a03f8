//! Repository layer: item and loan persistence
//!
//! Items and loans share one transaction boundary, so both live behind a
//! single [`LendingStore`] trait. [`Repository`] is the Postgres
//! implementation; [`memory::MemoryStore`] keeps everything in process.

pub mod items;
pub mod loans;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{item::Item, loan::{Loan, LoanStatus}},
};

/// Sort order for loan listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoanOrder {
    /// Oldest request first
    RequestedAsc,
    /// Newest request first
    #[default]
    RequestedDesc,
    /// Earliest hand-out first
    BorrowedAsc,
}

/// Filter for loan queries. Empty filter matches every loan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoanFilter {
    pub borrower_id: Option<Uuid>,
    pub statuses: Option<Vec<LoanStatus>>,
    /// Only loans with `returned_at IS NULL`
    pub unreturned: bool,
    /// Only loans with `due_at < due_before`
    pub due_before: Option<DateTime<Utc>>,
    pub order: LoanOrder,
}

impl LoanFilter {
    pub fn for_borrower(borrower_id: Uuid) -> Self {
        Self {
            borrower_id: Some(borrower_id),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[LoanStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn unreturned(mut self) -> Self {
        self.unreturned = true;
        self
    }

    pub fn due_before(mut self, at: DateTime<Utc>) -> Self {
        self.due_before = Some(at);
        self
    }

    pub fn order(mut self, order: LoanOrder) -> Self {
        self.order = order;
        self
    }

    /// In-process evaluation, mirrors the SQL built by the Postgres store
    pub fn matches(&self, loan: &Loan) -> bool {
        if let Some(borrower_id) = self.borrower_id {
            if loan.borrower_id != borrower_id {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&loan.status) {
                return false;
            }
        }
        if self.unreturned && loan.returned_at.is_some() {
            return false;
        }
        if let Some(at) = self.due_before {
            match loan.due_at {
                Some(due) if due < at => {}
                _ => return false,
            }
        }
        true
    }
}

/// Stock side effect committed together with a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    None,
    /// Take one unit; fails with `OUT_OF_STOCK` when the shelf is empty
    Decrement,
    Increment,
}

/// A status change to commit atomically.
///
/// The store applies `loan` only if the stored record is still in
/// `expected_status` and not returned, and applies `stock` to `loan.item_id`
/// in the same transaction. Either both happen or neither does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanTransition {
    pub expected_status: LoanStatus,
    pub loan: Loan,
    pub stock: StockChange,
}

/// Backing store for items and loans
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Connectivity check for readiness checks
    async fn ping(&self) -> AppResult<()>;

    async fn get_item(&self, id: Uuid) -> AppResult<Option<Item>>;

    async fn get_items(&self, ids: &[Uuid]) -> AppResult<Vec<Item>>;

    async fn list_items(&self) -> AppResult<Vec<Item>>;

    /// Insert an item; duplicate codes fail with a conflict
    async fn create_item(&self, item: &Item) -> AppResult<Item>;

    async fn get_loan(&self, id: Uuid) -> AppResult<Option<Loan>>;

    async fn find_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>>;

    /// Insert a new loan. Fails with `ACTIVE_LOAN_EXISTS` if the borrower
    /// already holds a loan slot.
    async fn insert_loan(&self, loan: &Loan) -> AppResult<Loan>;

    /// Apply a status change and its stock effect as one atomic unit
    async fn commit_transition(&self, transition: &LoanTransition) -> AppResult<Loan>;
}

/// True when `err` is a violation of the named database constraint
pub(crate) fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some(constraint),
        _ => false,
    }
}

/// Postgres repository holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub items: items::ItemsRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            items: items::ItemsRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl LendingStore for Repository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        self.items.get_by_id(id).await
    }

    async fn get_items(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        self.items.get_many(ids).await
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        self.items.list().await
    }

    async fn create_item(&self, item: &Item) -> AppResult<Item> {
        self.items.create(item).await
    }

    async fn get_loan(&self, id: Uuid) -> AppResult<Option<Loan>> {
        self.loans.get_by_id(id).await
    }

    async fn find_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        self.loans.find(filter).await
    }

    async fn insert_loan(&self, loan: &Loan) -> AppResult<Loan> {
        self.loans.insert(loan).await
    }

    async fn commit_transition(&self, transition: &LoanTransition) -> AppResult<Loan> {
        self.loans.commit_transition(transition).await
    }
}
