//! API handlers for the lending REST endpoints

pub mod health;
pub mod items;
pub mod loans;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::user::{Caller, Role},
    AppState,
};

/// Header carrying the caller's user ID, set by the authenticating gateway
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role (`BORROWER` or `STAFF`)
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor for the caller identity forwarded by the gateway
pub struct AuthenticatedUser(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)?
            .trim()
            .parse::<Uuid>()
            .map_err(|_| AppError::Authentication("Invalid user ID".to_string()))?;
        let role = header_value(parts, USER_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(AppError::Authentication)?;

        Ok(AuthenticatedUser(Caller { user_id, role }))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Authentication(format!("Missing {} header", name)))
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Items
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/:id", get(items::get_item))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::request_loan))
        .route("/loans/me", get(loans::my_loans))
        .route("/loans/pending", get(loans::list_pending))
        .route("/loans/active", get(loans::list_active))
        .route("/loans/late", get(loans::list_late))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/approve", post(loans::approve_loan))
        .route("/loans/:id/borrowed", post(loans::mark_borrowed))
        .route("/loans/:id/reject", post(loans::reject_loan))
        .route("/loans/:id/return-request", post(loans::request_return))
        .route("/loans/:id/return", post(loans::confirm_return))
        // Users
        .route("/users/:id/loans", get(loans::get_user_loans))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
