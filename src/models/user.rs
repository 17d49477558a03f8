//! Caller identity and roles

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Role of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Student or faculty member borrowing items
    Borrower,
    /// Admin or officer processing loans
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Borrower => "BORROWER",
            Role::Staff => "STAFF",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BORROWER" => Ok(Role::Borrower),
            "STAFF" | "ADMIN" => Ok(Role::Staff),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Identity of the caller, as forwarded by the authenticating gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Staff role required".to_string()))
        }
    }

    pub fn require_borrower(&self) -> Result<(), AppError> {
        if self.role == Role::Borrower {
            Ok(())
        } else {
            Err(AppError::Forbidden("Borrower role required".to_string()))
        }
    }

    /// Staff may read any loan, borrowers only their own
    pub fn require_owner_or_staff(&self, borrower_id: Uuid) -> Result<(), AppError> {
        if self.is_staff() || self.user_id == borrower_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("Loan belongs to another borrower".to_string()))
        }
    }
}
