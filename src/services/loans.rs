//! Loan lifecycle management
//!
//! Every state change goes through [`Loan`]'s transition methods and is then
//! committed with [`LendingStore::commit_transition`], so the status change
//! and its stock effect land together or not at all. Lateness is never
//! stored; it is recomputed from `due_at` on every read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::loan::{
        BorrowerLoans, LateLoanSummary, Loan, LoanDetails, LoanStatus, ReturnCondition,
        ReturnOutcome,
    },
    repository::{LendingStore, LoanFilter, LoanOrder, LoanTransition, StockChange},
};

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LendingStore>,
}

impl LoansService {
    pub fn new(store: Arc<dyn LendingStore>) -> Self {
        Self { store }
    }

    /// Whether the borrower holds a loan slot (pending, approved, out, or
    /// awaiting return)
    pub async fn has_active_loan(&self, borrower_id: Uuid) -> AppResult<bool> {
        let filter = LoanFilter::for_borrower(borrower_id)
            .with_statuses(&LoanStatus::ACTIVE)
            .unreturned();
        Ok(!self.store.find_loans(&filter).await?.is_empty())
    }

    /// Whether the borrower has an unreturned loan past its due date
    pub async fn has_late_loan(&self, borrower_id: Uuid) -> AppResult<bool> {
        let filter = LoanFilter::for_borrower(borrower_id)
            .unreturned()
            .due_before(Utc::now());
        Ok(!self.store.find_loans(&filter).await?.is_empty())
    }

    /// Borrower asks for an item. Nothing is reserved until staff approve.
    pub async fn request_loan(&self, borrower_id: Uuid, item_id: Uuid) -> AppResult<Loan> {
        if self.has_active_loan(borrower_id).await? {
            tracing::debug!("Borrower {} already holds a loan slot", borrower_id);
            return Err(AppError::ActiveLoanExists);
        }
        if self.has_late_loan(borrower_id).await? {
            tracing::debug!("Borrower {} has a late loan", borrower_id);
            return Err(AppError::LoanIsLate);
        }

        // A missing item is reported the same way as an empty shelf
        self.store
            .get_item(item_id)
            .await?
            .filter(|item| item.is_available())
            .ok_or(AppError::OutOfStock)?;

        let loan = self
            .store
            .insert_loan(&Loan::request(borrower_id, item_id, Utc::now()))
            .await?;

        tracing::info!(
            loan_id = %loan.id,
            borrower_id = %borrower_id,
            item_id = %item_id,
            "Loan requested"
        );
        Ok(loan)
    }

    /// PENDING -> APPROVED, takes one unit of stock and starts the 24h clock
    pub async fn approve_loan(&self, loan_id: Uuid, approver_id: Uuid) -> AppResult<Loan> {
        let loan = self.load(loan_id).await?;
        let approved = loan.approve(approver_id, Utc::now())?;

        let in_stock = self
            .store
            .get_item(loan.item_id)
            .await?
            .map_or(false, |item| item.is_available());
        if !in_stock {
            return Err(AppError::OutOfStock);
        }

        let loan = self
            .commit(loan.status, approved, StockChange::Decrement)
            .await?;
        tracing::info!(
            loan_id = %loan.id,
            approver_id = %approver_id,
            due_at = ?loan.due_at,
            "Loan approved"
        );
        Ok(loan)
    }

    /// APPROVED -> BORROWED once the item is handed over
    pub async fn mark_borrowed(&self, loan_id: Uuid, approver_id: Uuid) -> AppResult<Loan> {
        let loan = self.load(loan_id).await?;
        let borrowed = loan.mark_borrowed(approver_id)?;
        let loan = self.commit(loan.status, borrowed, StockChange::None).await?;
        tracing::info!(loan_id = %loan.id, "Item handed over");
        Ok(loan)
    }

    /// PENDING -> REJECTED. Stock was never taken, so none is given back.
    pub async fn reject_loan(&self, loan_id: Uuid, approver_id: Uuid) -> AppResult<Loan> {
        let loan = self.load(loan_id).await?;
        let rejected = loan.reject(approver_id)?;
        let loan = self.commit(loan.status, rejected, StockChange::None).await?;
        tracing::info!(loan_id = %loan.id, approver_id = %approver_id, "Loan rejected");
        Ok(loan)
    }

    /// BORROWED -> RETURN_REQUESTED, by the borrower
    pub async fn request_return(
        &self,
        loan_id: Uuid,
        borrower_id: Uuid,
        note: Option<String>,
    ) -> AppResult<Loan> {
        let loan = self.load(loan_id).await?;
        let requested = loan.request_return(borrower_id, clean_text(note))?;
        let loan = self
            .commit(loan.status, requested, StockChange::None)
            .await?;
        tracing::info!(loan_id = %loan.id, "Return requested");
        Ok(loan)
    }

    /// BORROWED | RETURN_REQUESTED -> RETURNED. Stock comes back only for
    /// items returned in good condition.
    pub async fn confirm_return(
        &self,
        loan_id: Uuid,
        approver_id: Uuid,
        condition: ReturnCondition,
        reason: Option<String>,
    ) -> AppResult<ReturnOutcome> {
        let loan = self.load(loan_id).await?;
        let now = Utc::now();
        let returned = loan.confirm_return(approver_id, condition, clean_text(reason), now)?;

        let stock = if condition.restores_stock() {
            StockChange::Increment
        } else {
            StockChange::None
        };
        let loan = self.commit(loan.status, returned, stock).await?;
        let outcome = ReturnOutcome::new(loan, condition, now);

        if outcome.is_late {
            tracing::warn!(
                loan_id = %outcome.loan.id,
                late_hours = ?outcome.late_hours,
                condition = ?condition,
                "Late return confirmed"
            );
        } else {
            tracing::info!(loan_id = %outcome.loan.id, condition = ?condition, "Return confirmed");
        }
        Ok(outcome)
    }

    /// Single loan with lateness
    pub async fn get_loan(&self, loan_id: Uuid) -> AppResult<LoanDetails> {
        let loan = self.load(loan_id).await?;
        let mut details = self.with_details(vec![loan], Utc::now()).await?;
        details
            .pop()
            .ok_or_else(|| AppError::Internal(format!("loan {} vanished", loan_id)))
    }

    /// Requests waiting for staff, oldest first
    pub async fn list_pending(&self) -> AppResult<Vec<LoanDetails>> {
        let filter = LoanFilter::default()
            .with_statuses(&[LoanStatus::Pending])
            .order(LoanOrder::RequestedAsc);
        self.list(&filter).await
    }

    /// Approved or handed-out loans, earliest hand-out first
    pub async fn list_active(&self) -> AppResult<Vec<LoanDetails>> {
        let filter = LoanFilter::default()
            .with_statuses(&LoanStatus::OUT_ON_LOAN)
            .order(LoanOrder::BorrowedAsc);
        self.list(&filter).await
    }

    /// Handed-out loans past their due date
    pub async fn list_late(&self) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let filter = LoanFilter::default()
            .with_statuses(&[LoanStatus::Borrowed])
            .order(LoanOrder::BorrowedAsc);
        let late: Vec<Loan> = self
            .store
            .find_loans(&filter)
            .await?
            .into_iter()
            .filter(|loan| loan.is_late_at(now))
            .collect();
        self.with_details(late, now).await
    }

    /// Every loan, newest first
    pub async fn list_all(&self) -> AppResult<Vec<LoanDetails>> {
        self.list(&LoanFilter::default()).await
    }

    /// A borrower's history with their eligibility flags
    pub async fn list_for_borrower(&self, borrower_id: Uuid) -> AppResult<BorrowerLoans> {
        let now = Utc::now();
        let loans = self
            .store
            .find_loans(&LoanFilter::for_borrower(borrower_id))
            .await?;
        let loans = self.with_details(loans, now).await?;

        let has_active_loan = loans.iter().any(|d| d.loan.occupies_slot());
        let late_loan = loans
            .iter()
            .filter(|d| d.is_late)
            .min_by_key(|d| d.loan.due_at)
            .and_then(|d| {
                Some(LateLoanSummary {
                    loan_id: d.loan.id,
                    item_name: d.item_name.clone(),
                    due_at: d.loan.due_at?,
                    hours_overdue: d.loan.hours_overdue_at(now),
                })
            });

        Ok(BorrowerLoans {
            has_active_loan,
            has_late_loan: late_loan.is_some(),
            late_loan,
            loans,
        })
    }

    async fn load(&self, loan_id: Uuid) -> AppResult<Loan> {
        self.store
            .get_loan(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))
    }

    async fn commit(
        &self,
        expected_status: LoanStatus,
        loan: Loan,
        stock: StockChange,
    ) -> AppResult<Loan> {
        self.store
            .commit_transition(&LoanTransition {
                expected_status,
                loan,
                stock,
            })
            .await
    }

    async fn list(&self, filter: &LoanFilter) -> AppResult<Vec<LoanDetails>> {
        let loans = self.store.find_loans(filter).await?;
        self.with_details(loans, Utc::now()).await
    }

    /// Attach item names and lateness as of `now`
    async fn with_details(
        &self,
        loans: Vec<Loan>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<LoanDetails>> {
        let mut ids: Vec<Uuid> = loans.iter().map(|l| l.item_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let names: HashMap<Uuid, String> = self
            .store
            .get_items(&ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item.name))
            .collect();

        Ok(loans
            .into_iter()
            .map(|loan| {
                let name = names.get(&loan.item_id).cloned();
                LoanDetails::new(loan, name, now)
            })
            .collect())
    }
}

/// Blank notes are treated as absent
fn clean_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
