//! Data models for the lending server

pub mod item;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use item::{CreateItem, Item};
pub use loan::{
    BorrowerLoans, LateLoanSummary, Loan, LoanDetails, LoanStatus, Punishment, ReturnCondition,
    ReturnOutcome,
};
pub use user::{Caller, Role};
