//! Loans repository for database operations

use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{violates, LoanFilter, LoanOrder, LoanTransition, StockChange};
use crate::{
    error::{AppError, AppResult},
    models::loan::Loan,
};

/// Partial unique index enforcing one loan slot per borrower
const ONE_ACTIVE_PER_BORROWER: &str = "loans_one_active_per_borrower";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(loan)
    }

    /// Filtered loan listing
    pub async fn find(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM loans WHERE TRUE");

        if let Some(borrower_id) = filter.borrower_id {
            query.push(" AND borrower_id = ").push_bind(borrower_id);
        }
        if let Some(statuses) = &filter.statuses {
            if statuses.is_empty() {
                return Ok(Vec::new());
            }
            query.push(" AND status IN (");
            let mut separated = query.separated(", ");
            for status in statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        if filter.unreturned {
            query.push(" AND returned_at IS NULL");
        }
        if let Some(at) = filter.due_before {
            query.push(" AND due_at < ").push_bind(at);
        }
        query.push(match filter.order {
            LoanOrder::RequestedAsc => " ORDER BY requested_at ASC",
            LoanOrder::RequestedDesc => " ORDER BY requested_at DESC",
            LoanOrder::BorrowedAsc => " ORDER BY borrowed_at ASC NULLS LAST",
        });

        let loans = query.build_query_as::<Loan>().fetch_all(&self.pool).await?;
        Ok(loans)
    }

    /// Insert a new loan request
    pub async fn insert(&self, loan: &Loan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (id, borrower_id, item_id, status, requested_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(loan.id)
        .bind(loan.borrower_id)
        .bind(loan.item_id)
        .bind(loan.status)
        .bind(loan.requested_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, ONE_ACTIVE_PER_BORROWER) {
                AppError::ActiveLoanExists
            } else {
                AppError::Database(e)
            }
        })
    }

    /// Commit a status change and its stock effect in one transaction.
    ///
    /// The loan update only matches a row still in the expected status, and
    /// the stock decrement only matches a row with stock left, so concurrent
    /// callers cannot both win. Returning early drops the transaction, which
    /// rolls it back.
    pub async fn commit_transition(&self, transition: &LoanTransition) -> AppResult<Loan> {
        let loan = &transition.loan;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $2,
                approver_id = $3,
                borrowed_at = $4,
                due_at = $5,
                returned_at = $6,
                return_condition = $7,
                return_note = $8
            WHERE id = $1 AND status = $9 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(loan.id)
        .bind(loan.status)
        .bind(loan.approver_id)
        .bind(loan.borrowed_at)
        .bind(loan.due_at)
        .bind(loan.returned_at)
        .bind(loan.return_condition)
        .bind(&loan.return_note)
        .bind(transition.expected_status)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            return Err(AppError::InvalidLoanStatus(format!(
                "loan {} is no longer {}",
                loan.id, transition.expected_status
            )));
        };

        let stock_sql = match transition.stock {
            StockChange::None => None,
            StockChange::Decrement => {
                Some("UPDATE items SET stock = stock - 1 WHERE id = $1 AND stock > 0")
            }
            StockChange::Increment => Some("UPDATE items SET stock = stock + 1 WHERE id = $1"),
        };

        if let Some(sql) = stock_sql {
            let result = sqlx::query(sql)
                .bind(loan.item_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(match transition.stock {
                    StockChange::Decrement => AppError::OutOfStock,
                    _ => AppError::ItemNotFound(loan.item_id),
                });
            }
        }

        tx.commit().await?;
        Ok(updated)
    }
}
