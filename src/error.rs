//! Error types for the lending server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Machine-readable error codes returned to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ActiveLoanExists,
    LoanIsLate,
    OutOfStock,
    InvalidLoanStatus,
    AlreadyReturned,
    LoanNotFound,
    ItemNotFound,
    Forbidden,
    NotAuthenticated,
    BadValue,
    Duplicate,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ActiveLoanExists => "ACTIVE_LOAN_EXISTS",
            ErrorCode::LoanIsLate => "LOAN_IS_LATE",
            ErrorCode::OutOfStock => "OUT_OF_STOCK",
            ErrorCode::InvalidLoanStatus => "INVALID_LOAN_STATUS",
            ErrorCode::AlreadyReturned => "ALREADY_RETURNED",
            ErrorCode::LoanNotFound => "LOAN_NOT_FOUND",
            ErrorCode::ItemNotFound => "ITEM_NOT_FOUND",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotAuthenticated => "NOT_AUTHENTICATED",
            ErrorCode::BadValue => "BAD_VALUE",
            ErrorCode::Duplicate => "DUPLICATE",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main application error type
///
/// Domain variants are expected rule violations the caller can act on.
/// `Database` and `Unavailable` are infrastructure faults; nothing in the
/// server retries them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Borrower already has an active loan; return it before requesting another")]
    ActiveLoanExists,

    #[error("Borrower has a late loan; return it before requesting another")]
    LoanIsLate,

    #[error("Item is out of stock")]
    OutOfStock,

    #[error("Invalid loan status: {0}")]
    InvalidLoanStatus(String),

    #[error("Loan {0} has already been returned")]
    AlreadyReturned(Uuid),

    #[error("Loan {0} not found")]
    LoanNotFound(Uuid),

    #[error("Item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::ActiveLoanExists => ErrorCode::ActiveLoanExists,
            AppError::LoanIsLate => ErrorCode::LoanIsLate,
            AppError::OutOfStock => ErrorCode::OutOfStock,
            AppError::InvalidLoanStatus(_) => ErrorCode::InvalidLoanStatus,
            AppError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            AppError::LoanNotFound(_) => ErrorCode::LoanNotFound,
            AppError::ItemNotFound(_) => ErrorCode::ItemNotFound,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::Authentication(_) => ErrorCode::NotAuthenticated,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::Database(_) | AppError::Unavailable(_) => ErrorCode::Unavailable,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ActiveLoanExists | AppError::LoanIsLate => StatusCode::CONFLICT,
            AppError::OutOfStock => StatusCode::CONFLICT,
            AppError::InvalidLoanStatus(_) | AppError::AlreadyReturned(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::LoanNotFound(_) | AppError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Store unavailable, try again later".to_string()
            }
            AppError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                "Store unavailable, try again later".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: self.code().as_str().to_string(),
            message,
        });

        (self.status(), body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
