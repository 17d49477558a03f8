//! Loan lifecycle through the service layer on the in-memory store

use std::sync::Arc;

use asset_lending_server::{
    models::{
        item::CreateItem,
        loan::{LoanStatus, Punishment, ReturnCondition},
    },
    repository::memory::MemoryStore,
    services::Services,
    AppError,
};
use uuid::Uuid;

fn services() -> Services {
    Services::new(Arc::new(MemoryStore::new()))
}

async fn item(services: &Services, stock: i32) -> Uuid {
    services
        .items
        .create(CreateItem {
            code: format!("TAB-{}", Uuid::new_v4().simple()),
            name: "Tablet".to_string(),
            condition: None,
            stock,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_never_oversell() {
    let services = services();
    let item_id = item(&services, 1).await;

    let mut pending = Vec::new();
    for _ in 0..8 {
        let loan = services
            .loans
            .request_loan(Uuid::new_v4(), item_id)
            .await
            .unwrap();
        pending.push(loan.id);
    }

    let handles: Vec<_> = pending
        .into_iter()
        .map(|loan_id| {
            let services = services.clone();
            tokio::spawn(async move { services.loans.approve_loan(loan_id, Uuid::new_v4()).await })
        })
        .collect();

    let mut approved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(loan) => {
                assert_eq!(loan.status, LoanStatus::Approved);
                approved += 1;
            }
            Err(err) => assert!(matches!(err, AppError::OutOfStock), "unexpected {err:?}"),
        }
    }

    assert_eq!(approved, 1);
    assert_eq!(services.items.get_by_id(item_id).await.unwrap().stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_approvals_of_one_loan_take_one_unit() {
    let services = services();
    let item_id = item(&services, 3).await;
    let loan = services
        .loans
        .request_loan(Uuid::new_v4(), item_id)
        .await
        .unwrap();
    let loan_id = loan.id;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let services = services.clone();
            tokio::spawn(async move { services.loans.approve_loan(loan_id, Uuid::new_v4()).await })
        })
        .collect();

    let mut approved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => approved += 1,
            Err(err) => assert!(matches!(err, AppError::InvalidLoanStatus(_)), "unexpected {err:?}"),
        }
    }

    assert_eq!(approved, 1);
    assert_eq!(services.items.get_by_id(item_id).await.unwrap().stock, 2);
}

#[tokio::test]
async fn test_borrower_can_request_again_after_return() {
    let services = services();
    let item_id = item(&services, 1).await;
    let borrower = Uuid::new_v4();
    let staff = Uuid::new_v4();

    let loan = services.loans.request_loan(borrower, item_id).await.unwrap();
    services.loans.approve_loan(loan.id, staff).await.unwrap();
    services.loans.mark_borrowed(loan.id, staff).await.unwrap();
    assert!(services.loans.has_active_loan(borrower).await.unwrap());

    let outcome = services
        .loans
        .confirm_return(loan.id, staff, ReturnCondition::Lost, Some("left on the bus".into()))
        .await
        .unwrap();
    assert_eq!(outcome.punishment, Punishment::Lost);
    assert!(!outcome.stock_restored);
    assert_eq!(outcome.loan.return_note.as_deref(), Some("left on the bus"));

    // A lost item stays off the shelf, so the next request finds nothing to borrow
    assert!(!services.loans.has_active_loan(borrower).await.unwrap());
    let again = services.loans.request_loan(borrower, item_id).await;
    assert!(matches!(again, Err(AppError::OutOfStock)));
}

#[tokio::test]
async fn test_rejected_request_frees_the_slot() {
    let services = services();
    let item_id = item(&services, 1).await;
    let borrower = Uuid::new_v4();

    let loan = services.loans.request_loan(borrower, item_id).await.unwrap();
    let rejected = services.loans.reject_loan(loan.id, Uuid::new_v4()).await.unwrap();
    assert_eq!(rejected.status, LoanStatus::Rejected);
    assert_eq!(services.items.get_by_id(item_id).await.unwrap().stock, 1);

    let second = services.loans.request_loan(borrower, item_id).await.unwrap();
    assert_eq!(second.status, LoanStatus::Pending);
}
