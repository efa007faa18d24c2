//! API handlers for the Visitor Desk REST endpoints

pub mod employees;
pub mod flows;
pub mod health;
pub mod openapi;
pub mod visitors;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// The caller's bearer token, forwarded untouched to the visitor API
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = bearer.token().trim();
        if token.is_empty() {
            return Err(AppError::Authentication("Empty bearer token".to_string()));
        }
        Ok(BearerToken(token.to_string()))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Registration flow
        .route("/flows", post(flows::open_flow))
        .route("/flows/:id", get(flows::get_flow).delete(flows::close_flow))
        .route("/flows/:id/draft", get(flows::get_draft).put(flows::compose))
        .route("/flows/:id/preview", get(flows::preview))
        .route("/flows/:id/invite", post(flows::invite))
        .route("/flows/:id/share", post(flows::share))
        .route("/flows/:id/cancel", post(flows::cancel))
        .route("/flows/:id/blobs/:blob_id", get(flows::get_blob))
        // Visitors
        .route("/visitors", get(visitors::list_visitors))
        .route("/visitors/last-visits", get(visitors::last_visits))
        .route("/visitors/:id", get(visitors::get_visitor))
        .route("/visitors/:id/approve", post(visitors::approve_visitor))
        .route("/visitors/:id/reject", post(visitors::reject_visitor))
        .route("/visitors/:id/check-in", post(visitors::check_in_visitor))
        .route("/visitors/:id/check-out", post(visitors::check_out_visitor))
        // Employee directory
        .route("/employees", get(employees::list_employees))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
