//! In-process store backed by hash maps.
//!
//! Every operation takes the single state lock, so check-then-write
//! sequences are atomic the same way a Postgres transaction makes them.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{LendingStore, LoanFilter, LoanOrder, LoanTransition, StockChange};
use crate::{
    error::{AppError, AppResult},
    models::{item::Item, loan::Loan},
};

#[derive(Default)]
struct State {
    items: HashMap<Uuid, Item>,
    loans: HashMap<Uuid, Loan>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a loan record as-is, bypassing lifecycle checks.
    /// Used to import existing records and to build fixtures.
    pub async fn put_loan(&self, loan: Loan) {
        self.state.lock().await.loans.insert(loan.id, loan);
    }
}

fn sort_loans(loans: &mut [Loan], order: LoanOrder) {
    match order {
        LoanOrder::RequestedAsc => loans.sort_by_key(|l| l.requested_at),
        LoanOrder::RequestedDesc => {
            loans.sort_by(|a, b| b.requested_at.cmp(&a.requested_at))
        }
        // Loans without a hand-out date go last
        LoanOrder::BorrowedAsc => loans.sort_by_key(|l| (l.borrowed_at.is_none(), l.borrowed_at)),
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        Ok(self.state.lock().await.items.get(&id).cloned())
    }

    async fn get_items(&self, ids: &[Uuid]) -> AppResult<Vec<Item>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.items.get(id).cloned()).collect())
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        let mut items: Vec<Item> = self.state.lock().await.items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        Ok(items)
    }

    async fn create_item(&self, item: &Item) -> AppResult<Item> {
        let mut state = self.state.lock().await;
        if state.items.values().any(|i| i.code == item.code) {
            return Err(AppError::Conflict(format!(
                "Item code {} already exists",
                item.code
            )));
        }
        state.items.insert(item.id, item.clone());
        Ok(item.clone())
    }

    async fn get_loan(&self, id: Uuid) -> AppResult<Option<Loan>> {
        Ok(self.state.lock().await.loans.get(&id).cloned())
    }

    async fn find_loans(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .state
            .lock()
            .await
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        sort_loans(&mut loans, filter.order);
        Ok(loans)
    }

    async fn insert_loan(&self, loan: &Loan) -> AppResult<Loan> {
        let mut state = self.state.lock().await;
        let slot_taken = state
            .loans
            .values()
            .any(|l| l.borrower_id == loan.borrower_id && l.occupies_slot());
        if slot_taken && loan.occupies_slot() {
            return Err(AppError::ActiveLoanExists);
        }
        state.loans.insert(loan.id, loan.clone());
        Ok(loan.clone())
    }

    async fn commit_transition(&self, transition: &LoanTransition) -> AppResult<Loan> {
        let mut state = self.state.lock().await;
        let loan = &transition.loan;

        match state.loans.get(&loan.id) {
            Some(current)
                if current.status == transition.expected_status
                    && current.returned_at.is_none() => {}
            Some(_) => {
                return Err(AppError::InvalidLoanStatus(format!(
                    "loan {} is no longer {}",
                    loan.id, transition.expected_status
                )))
            }
            None => return Err(AppError::LoanNotFound(loan.id)),
        }

        // Validate the stock side before touching anything
        let item = state
            .items
            .get_mut(&loan.item_id)
            .ok_or(AppError::ItemNotFound(loan.item_id));
        match transition.stock {
            StockChange::None => {}
            StockChange::Decrement => {
                let item = item.map_err(|_| AppError::OutOfStock)?;
                if item.stock <= 0 {
                    return Err(AppError::OutOfStock);
                }
                item.stock -= 1;
            }
            StockChange::Increment => item?.stock += 1,
        }

        state.loans.insert(loan.id, loan.clone());
        Ok(loan.clone())
    }
}
