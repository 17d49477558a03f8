//! Loan model, status machine and derived lateness

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Fixed loan duration, counted from approval
pub const LOAN_DURATION_HOURS: i64 = 24;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "loan_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Borrowed,
    ReturnRequested,
    Returned,
    Rejected,
}

impl LoanStatus {
    /// Statuses occupying the borrower's single loan slot
    pub const ACTIVE: [LoanStatus; 4] = [
        LoanStatus::Pending,
        LoanStatus::Approved,
        LoanStatus::Borrowed,
        LoanStatus::ReturnRequested,
    ];

    /// Statuses listed as "active" on the staff dashboard
    pub const OUT_ON_LOAN: [LoanStatus; 2] = [LoanStatus::Approved, LoanStatus::Borrowed];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Rejected)
    }

    /// Transition table. Anything not listed here is refused.
    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Borrowed)
                | (Borrowed, ReturnRequested)
                | (Borrowed, Returned)
                | (ReturnRequested, Returned)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Borrowed => "BORROWED",
            LoanStatus::ReturnRequested => "RETURN_REQUESTED",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition of an item when its return is confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "return_condition", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnCondition {
    Good,
    Damaged,
    Lost,
}

impl ReturnCondition {
    /// Only items coming back in good shape go back on the shelf
    pub fn restores_stock(self) -> bool {
        self == ReturnCondition::Good
    }
}

/// Informational classification of a confirmed return. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Punishment {
    None,
    Late,
    Damaged,
    Lost,
    /// Late and not returned in good condition
    Both,
}

impl Punishment {
    pub fn classify(is_late: bool, condition: ReturnCondition) -> Self {
        match (is_late, condition) {
            (false, ReturnCondition::Good) => Punishment::None,
            (true, ReturnCondition::Good) => Punishment::Late,
            (false, ReturnCondition::Damaged) => Punishment::Damaged,
            (false, ReturnCondition::Lost) => Punishment::Lost,
            (true, _) => Punishment::Both,
        }
    }
}

/// Loan record as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: Uuid,
    pub borrower_id: Uuid,
    pub item_id: Uuid,
    /// Staff member who last processed the loan
    pub approver_id: Option<Uuid>,
    pub status: LoanStatus,
    pub requested_at: DateTime<Utc>,
    pub borrowed_at: Option<DateTime<Utc>>,
    /// Always `borrowed_at + 24h`
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub return_condition: Option<ReturnCondition>,
    pub return_note: Option<String>,
}

/// Due date for a loan handed out at `borrowed_at`
pub fn due_date(borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
    borrowed_at + Duration::hours(LOAN_DURATION_HOURS)
}

/// Late iff the due date has passed and the item is not back yet.
/// Loans without a due date (still pending) are never late.
pub fn is_late(
    due_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match due_at {
        Some(due) => returned_at.is_none() && now > due,
        None => false,
    }
}

/// Whole hours past due, rounded up. `None` when not past due.
pub fn late_hours_ceil(due_at: Option<DateTime<Utc>>, at: DateTime<Utc>) -> Option<i64> {
    let due = due_at?;
    if at <= due {
        return None;
    }
    let ms = (at - due).num_milliseconds();
    let hour_ms = Duration::hours(1).num_milliseconds();
    Some((ms + hour_ms - 1) / hour_ms)
}

impl Loan {
    /// New pending request. No stock is committed and no due date is set.
    pub fn request(borrower_id: Uuid, item_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            borrower_id,
            item_id,
            approver_id: None,
            status: LoanStatus::Pending,
            requested_at: now,
            borrowed_at: None,
            due_at: None,
            returned_at: None,
            return_condition: None,
            return_note: None,
        }
    }

    /// Counts against the borrower's single loan slot
    pub fn occupies_slot(&self) -> bool {
        self.status.is_active() && self.returned_at.is_none()
    }

    pub fn is_late_at(&self, now: DateTime<Utc>) -> bool {
        is_late(self.due_at, self.returned_at, now)
    }

    /// Whole hours overdue, rounded down, as shown on the borrower dashboard
    pub fn hours_overdue_at(&self, now: DateTime<Utc>) -> i64 {
        match self.due_at {
            Some(due) if self.is_late_at(now) => (now - due).num_hours(),
            _ => 0,
        }
    }

    fn ensure_transition(&self, next: LoanStatus) -> AppResult<()> {
        if self.returned_at.is_some() || !self.status.can_transition_to(next) {
            return Err(AppError::InvalidLoanStatus(format!(
                "loan {} is {} and cannot move to {}",
                self.id, self.status, next
            )));
        }
        Ok(())
    }

    /// PENDING -> APPROVED. Starts the 24 hour clock.
    pub fn approve(&self, approver_id: Uuid, now: DateTime<Utc>) -> AppResult<Loan> {
        self.ensure_transition(LoanStatus::Approved)?;
        Ok(Loan {
            status: LoanStatus::Approved,
            approver_id: Some(approver_id),
            borrowed_at: Some(now),
            due_at: Some(due_date(now)),
            ..self.clone()
        })
    }

    /// APPROVED -> BORROWED, the physical hand-off
    pub fn mark_borrowed(&self, approver_id: Uuid) -> AppResult<Loan> {
        self.ensure_transition(LoanStatus::Borrowed)?;
        Ok(Loan {
            status: LoanStatus::Borrowed,
            approver_id: Some(approver_id),
            ..self.clone()
        })
    }

    /// PENDING -> REJECTED
    pub fn reject(&self, approver_id: Uuid) -> AppResult<Loan> {
        self.ensure_transition(LoanStatus::Rejected)?;
        Ok(Loan {
            status: LoanStatus::Rejected,
            approver_id: Some(approver_id),
            ..self.clone()
        })
    }

    /// BORROWED -> RETURN_REQUESTED, only by the borrower holding the loan
    pub fn request_return(&self, borrower_id: Uuid, note: Option<String>) -> AppResult<Loan> {
        if self.borrower_id != borrower_id {
            return Err(AppError::Forbidden(format!(
                "loan {} does not belong to the caller",
                self.id
            )));
        }
        self.ensure_transition(LoanStatus::ReturnRequested)?;
        Ok(Loan {
            status: LoanStatus::ReturnRequested,
            return_note: note.or_else(|| self.return_note.clone()),
            ..self.clone()
        })
    }

    /// BORROWED | RETURN_REQUESTED -> RETURNED
    pub fn confirm_return(
        &self,
        approver_id: Uuid,
        condition: ReturnCondition,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        if self.returned_at.is_some() {
            return Err(AppError::AlreadyReturned(self.id));
        }
        self.ensure_transition(LoanStatus::Returned)?;
        Ok(Loan {
            status: LoanStatus::Returned,
            approver_id: Some(approver_id),
            returned_at: Some(now),
            return_condition: Some(condition),
            return_note: reason.or_else(|| self.return_note.clone()),
            ..self.clone()
        })
    }
}

/// Loan as served to callers, with lateness computed at read time
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub item_name: Option<String>,
    pub is_late: bool,
}

impl LoanDetails {
    pub fn new(loan: Loan, item_name: Option<String>, now: DateTime<Utc>) -> Self {
        let is_late = loan.is_late_at(now);
        Self {
            loan,
            item_name,
            is_late,
        }
    }
}

/// Details of the loan blocking a borrower, for the dashboard alert
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LateLoanSummary {
    pub loan_id: Uuid,
    pub item_name: Option<String>,
    pub due_at: DateTime<Utc>,
    pub hours_overdue: i64,
}

/// A borrower's loan history plus eligibility flags
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowerLoans {
    pub has_active_loan: bool,
    pub has_late_loan: bool,
    pub late_loan: Option<LateLoanSummary>,
    pub loans: Vec<LoanDetails>,
}

/// Result of a confirmed return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan: Loan,
    pub status: LoanStatus,
    pub condition: ReturnCondition,
    pub is_late: bool,
    /// Hours past due, rounded up
    pub late_hours: Option<i64>,
    pub stock_restored: bool,
    pub punishment: Punishment,
    pub message: String,
}

impl ReturnOutcome {
    pub fn new(loan: Loan, condition: ReturnCondition, returned_at: DateTime<Utc>) -> Self {
        let late_hours = late_hours_ceil(loan.due_at, returned_at);
        let is_late = late_hours.is_some();
        let stock_restored = condition.restores_stock();

        let mut message = match condition {
            ReturnCondition::Good => "Item returned".to_string(),
            ReturnCondition::Damaged => {
                "Item returned DAMAGED; stock not restored, record the damage".to_string()
            }
            ReturnCondition::Lost => {
                "Item marked LOST; stock not restored, follow up with the borrower".to_string()
            }
        };
        if let Some(hours) = late_hours {
            message.push_str(&format!(" (LATE: {} hour(s) past due)", hours));
        }

        Self {
            status: loan.status,
            loan,
            condition,
            is_late,
            late_hours,
            stock_restored,
            punishment: Punishment::classify(is_late, condition),
            message,
        }
    }
}
