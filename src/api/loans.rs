//! Loan lifecycle endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::loan::{BorrowerLoans, Loan, LoanDetails, ReturnCondition, ReturnOutcome},
};

use super::AuthenticatedUser;

/// Borrower's loan request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateLoanRequest {
    /// Item to borrow
    pub item_id: Uuid,
    /// Not accepted: the due date is computed at approval
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub due_at: Option<Value>,
    /// Not accepted: the loan starts at approval
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub borrowed_at: Option<Value>,
}

/// Optional approval body. Dates are computed by the server, never taken from callers.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ApproveLoanRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub due_at: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub borrowed_at: Option<Value>,
}

/// Borrower's return request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RequestReturnRequest {
    /// Free-text note for staff
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Staff confirmation of a return
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ConfirmReturnRequest {
    /// Condition the item came back in
    pub condition: ReturnCondition,
    /// Damage or loss details
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Decode a JSON body regardless of content type. An empty body is `None`;
/// anything else must decode or the request fails with `BAD_VALUE`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

fn require_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<T> {
    parse_body(body)?.ok_or_else(|| AppError::Validation("Request body is required".to_string()))
}

fn reject_client_dates(due_at: &Option<Value>, borrowed_at: &Option<Value>) -> AppResult<()> {
    let supplied = |v: &Option<Value>| matches!(v, Some(value) if !value.is_null());
    if supplied(due_at) || supplied(borrowed_at) {
        return Err(AppError::Validation(
            "Loan dates are set by the server and cannot be supplied".to_string(),
        ));
    }
    Ok(())
}

/// Request to borrow an item
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan requested, awaiting approval", body = Loan),
        (status = 400, description = "Caller supplied loan dates", body = crate::error::ErrorResponse),
        (status = 409, description = "Active loan exists, late loan, or out of stock", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Loan>)> {
    caller.require_borrower()?;
    let request: CreateLoanRequest = require_body(&body)?;
    reject_client_dates(&request.due_at, &request.borrowed_at)?;

    let loan = state
        .services
        .loans
        .request_loan(caller.user_id, request.item_id)
        .await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Approve a pending loan
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body(content = Option<ApproveLoanRequest>, description = "Must not carry dates"),
    responses(
        (status = 200, description = "Loan approved, due in 24 hours", body = Loan),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Out of stock", body = crate::error::ErrorResponse),
        (status = 422, description = "Loan is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Loan>> {
    caller.require_staff()?;
    if let Some(request) = parse_body::<ApproveLoanRequest>(&body)? {
        reject_client_dates(&request.due_at, &request.borrowed_at)?;
    }

    let loan = state
        .services
        .loans
        .approve_loan(loan_id, caller.user_id)
        .await?;
    Ok(Json(loan))
}

/// Record the hand-off of an approved loan
#[utoipa::path(
    post,
    path = "/loans/{id}/borrowed",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Item handed over", body = Loan),
        (status = 422, description = "Loan is not approved", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_borrowed(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    caller.require_staff()?;
    let loan = state
        .services
        .loans
        .mark_borrowed(loan_id, caller.user_id)
        .await?;
    Ok(Json(loan))
}

/// Reject a pending loan
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan rejected", body = Loan),
        (status = 422, description = "Loan is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<Loan>> {
    caller.require_staff()?;
    let loan = state
        .services
        .loans
        .reject_loan(loan_id, caller.user_id)
        .await?;
    Ok(Json(loan))
}

/// Borrower announces a return
#[utoipa::path(
    post,
    path = "/loans/{id}/return-request",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = RequestReturnRequest,
    responses(
        (status = 200, description = "Return requested", body = Loan),
        (status = 403, description = "Loan belongs to someone else", body = crate::error::ErrorResponse),
        (status = 422, description = "Loan is not borrowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Loan>> {
    caller.require_borrower()?;
    let request: RequestReturnRequest = parse_body(&body)?.unwrap_or_default();
    request.validate()?;

    let loan = state
        .services
        .loans
        .request_return(loan_id, caller.user_id, request.note)
        .await?;
    Ok(Json(loan))
}

/// Staff confirm a return and record the item condition
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = ConfirmReturnRequest,
    responses(
        (status = 200, description = "Return processed", body = ReturnOutcome),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Loan not out or already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn confirm_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<ReturnOutcome>> {
    caller.require_staff()?;
    let request: ConfirmReturnRequest = require_body(&body)?;
    request.validate()?;

    let outcome = state
        .services
        .loans
        .confirm_return(loan_id, caller.user_id, request.condition, request.reason)
        .await?;
    Ok(Json(outcome))
}

/// Get one loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 403, description = "Not the caller's loan, or unknown to a borrower", body = crate::error::ErrorResponse),
        (status = 404, description = "Loan not found (staff only)", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<LoanDetails>> {
    // Borrowers get the same answer for unknown ids and other people's loans
    let details = match state.services.loans.get_loan(loan_id).await {
        Err(AppError::LoanNotFound(_)) if !caller.is_staff() => {
            return Err(AppError::Forbidden("Loan belongs to another borrower".to_string()))
        }
        result => result?,
    };
    caller.require_owner_or_staff(details.loan.borrower_id)?;
    Ok(Json(details))
}

/// All loans, newest first
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    responses(
        (status = 200, description = "All loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    caller.require_staff()?;
    Ok(Json(state.services.loans.list_all().await?))
}

/// Requests awaiting approval
#[utoipa::path(
    get,
    path = "/loans/pending",
    tag = "loans",
    responses(
        (status = 200, description = "Pending loans, oldest first", body = Vec<LoanDetails>)
    )
)]
pub async fn list_pending(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    caller.require_staff()?;
    Ok(Json(state.services.loans.list_pending().await?))
}

/// Approved and handed-out loans
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    responses(
        (status = 200, description = "Approved and borrowed loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_active(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    caller.require_staff()?;
    Ok(Json(state.services.loans.list_active().await?))
}

/// Borrowed loans past due
#[utoipa::path(
    get,
    path = "/loans/late",
    tag = "loans",
    responses(
        (status = 200, description = "Late loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_late(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    caller.require_staff()?;
    Ok(Json(state.services.loans.list_late().await?))
}

/// The caller's own loans and eligibility
#[utoipa::path(
    get,
    path = "/loans/me",
    tag = "loans",
    responses(
        (status = 200, description = "Caller's loans", body = BorrowerLoans)
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<BorrowerLoans>> {
    caller.require_borrower()?;
    Ok(Json(state.services.loans.list_for_borrower(caller.user_id).await?))
}

/// Loans of a given borrower
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(("id" = Uuid, Path, description = "Borrower ID")),
    responses(
        (status = 200, description = "Borrower's loans", body = BorrowerLoans)
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(borrower_id): Path<Uuid>,
) -> AppResult<Json<BorrowerLoans>> {
    caller.require_staff()?;
    Ok(Json(state.services.loans.list_for_borrower(borrower_id).await?))
}
