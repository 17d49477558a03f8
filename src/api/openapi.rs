//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, items, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Asset Lending API",
        version = "1.0.0",
        description = "School asset lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::get_item,
        items::create_item,
        // Loans
        loans::request_loan,
        loans::approve_loan,
        loans::mark_borrowed,
        loans::reject_loan,
        loans::request_return,
        loans::confirm_return,
        loans::get_loan,
        loans::list_loans,
        loans::list_pending,
        loans::list_active,
        loans::list_late,
        loans::my_loans,
        loans::get_user_loans,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::CreateItem,
            // Loans
            loans::CreateLoanRequest,
            loans::ApproveLoanRequest,
            loans::RequestReturnRequest,
            loans::ConfirmReturnRequest,
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::ReturnCondition,
            crate::models::loan::Punishment,
            crate::models::loan::LoanDetails,
            crate::models::loan::LateLoanSummary,
            crate::models::loan::BorrowerLoans,
            crate::models::loan::ReturnOutcome,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "items", description = "Lendable items"),
        (name = "loans", description = "Loan lifecycle")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
