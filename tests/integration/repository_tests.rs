//! Postgres store tests. Need a reachable database:
//! `DATABASE_URL=postgres://... cargo test --test repository_tests -- --ignored`

use std::sync::Arc;

use asset_lending_server::{
    models::{
        item::{CreateItem, Item},
        loan::{Loan, LoanStatus},
    },
    repository::{LendingStore, LoanFilter, LoanTransition, Repository, StockChange},
    AppConfig, AppError,
};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn repository() -> Repository {
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| AppConfig::default().database.url);
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    Repository::new(pool)
}

async fn item(repo: &Repository, stock: i32) -> Item {
    let item = CreateItem {
        code: format!("PG-{}", Uuid::new_v4().simple()),
        name: "Microscope".to_string(),
        condition: None,
        stock,
    }
    .into_item(Utc::now());
    repo.create_item(&item).await.expect("Failed to create item")
}

fn approval(loan: &Loan) -> LoanTransition {
    LoanTransition {
        expected_status: LoanStatus::Pending,
        loan: loan.approve(Uuid::new_v4(), Utc::now()).unwrap(),
        stock: StockChange::Decrement,
    }
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_racing_approvals_take_the_last_unit_once() {
    let repo = Arc::new(repository().await);
    let item = item(&repo, 1).await;

    let mut transitions = Vec::new();
    for _ in 0..6 {
        let loan = repo
            .insert_loan(&Loan::request(Uuid::new_v4(), item.id, Utc::now()))
            .await
            .unwrap();
        transitions.push(approval(&loan));
    }

    let handles: Vec<_> = transitions
        .into_iter()
        .map(|transition| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.commit_transition(&transition).await })
        })
        .collect();

    let mut approved = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(loan) => approved.push(loan),
            Err(err) => assert!(matches!(err, AppError::OutOfStock), "unexpected {err:?}"),
        }
    }

    assert_eq!(approved.len(), 1);
    assert_eq!(repo.get_item(item.id).await.unwrap().unwrap().stock, 0);

    // Losers rolled back and are still pending without a due date
    let losers = repo
        .find_loans(&LoanFilter::default().with_statuses(&[LoanStatus::Pending]))
        .await
        .unwrap();
    assert!(losers
        .iter()
        .filter(|l| l.item_id == item.id)
        .all(|l| l.due_at.is_none()));
}

#[tokio::test]
#[ignore]
async fn test_replayed_transition_is_refused() {
    let repo = repository().await;
    let item = item(&repo, 2).await;
    let loan = repo
        .insert_loan(&Loan::request(Uuid::new_v4(), item.id, Utc::now()))
        .await
        .unwrap();

    let transition = approval(&loan);
    let approved = repo.commit_transition(&transition).await.unwrap();
    assert_eq!(approved.status, LoanStatus::Approved);
    assert!(approved.due_at.is_some());

    let replay = repo.commit_transition(&transition).await;
    assert!(matches!(replay, Err(AppError::InvalidLoanStatus(_))));
    assert_eq!(repo.get_item(item.id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
#[ignore]
async fn test_second_active_loan_hits_unique_index() {
    let repo = repository().await;
    let item = item(&repo, 2).await;
    let borrower = Uuid::new_v4();

    repo.insert_loan(&Loan::request(borrower, item.id, Utc::now()))
        .await
        .unwrap();
    let second = repo
        .insert_loan(&Loan::request(borrower, item.id, Utc::now()))
        .await;
    assert!(matches!(second, Err(AppError::ActiveLoanExists)));
}
