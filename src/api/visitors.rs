//! Visitor history and status endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::AppResult,
    models::VisitorRecord,
    services::visitors::LAST_VISITS,
    AppState,
};

use super::BearerToken;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LastVisitsQuery {
    /// Visitor phone number
    pub phone: String,
    /// Number of visits to return (default 2)
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckTimeRequest {
    /// Defaults to now
    pub at: Option<DateTime<Utc>>,
}

/// Visitor history, most recent first
#[utoipa::path(
    get,
    path = "/visitors",
    tag = "visitors",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Visitors", body = Vec<VisitorRecord>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_visitors(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Vec<VisitorRecord>>> {
    Ok(Json(state.services.visitors.history(&token).await?))
}

/// Most recent visits for a phone number
#[utoipa::path(
    get,
    path = "/visitors/last-visits",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(LastVisitsQuery),
    responses(
        (status = 200, description = "Recent visits", body = Vec<VisitorRecord>)
    )
)]
pub async fn last_visits(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Query(query): Query<LastVisitsQuery>,
) -> AppResult<Json<Vec<VisitorRecord>>> {
    let limit = query.limit.unwrap_or(LAST_VISITS);
    Ok(Json(
        state
            .services
            .visitors
            .last_visits(&query.phone, limit, &token)
            .await?,
    ))
}

/// Get a visitor by ID
#[utoipa::path(
    get,
    path = "/visitors/{id}",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor", body = VisitorRecord),
        (status = 404, description = "Visitor not found")
    )
)]
pub async fn get_visitor(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> AppResult<Json<VisitorRecord>> {
    Ok(Json(state.services.visitors.get(&id, &token).await?))
}

/// Approve a pending visitor
#[utoipa::path(
    post,
    path = "/visitors/{id}/approve",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor approved", body = VisitorRecord),
        (status = 409, description = "Visitor is not pending")
    )
)]
pub async fn approve_visitor(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> AppResult<Json<VisitorRecord>> {
    Ok(Json(state.services.visitors.approve(&id, &token).await?))
}

/// Reject a pending visitor
#[utoipa::path(
    post,
    path = "/visitors/{id}/reject",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor rejected", body = VisitorRecord),
        (status = 409, description = "Visitor is not pending")
    )
)]
pub async fn reject_visitor(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
) -> AppResult<Json<VisitorRecord>> {
    Ok(Json(state.services.visitors.reject(&id, &token).await?))
}

/// Check an approved visitor in
#[utoipa::path(
    post,
    path = "/visitors/{id}/check-in",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Visitor ID")),
    request_body = CheckTimeRequest,
    responses(
        (status = 200, description = "Visitor checked in", body = VisitorRecord),
        (status = 409, description = "Visitor is not approved")
    )
)]
pub async fn check_in_visitor(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
    body: Option<Json<CheckTimeRequest>>,
) -> AppResult<Json<VisitorRecord>> {
    let at = body.and_then(|Json(b)| b.at).unwrap_or_else(Utc::now);
    Ok(Json(state.services.visitors.check_in(&id, at, &token).await?))
}

/// Check a visitor out
#[utoipa::path(
    post,
    path = "/visitors/{id}/check-out",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Visitor ID")),
    request_body = CheckTimeRequest,
    responses(
        (status = 200, description = "Visitor checked out", body = VisitorRecord),
        (status = 409, description = "Visitor is not checked in")
    )
)]
pub async fn check_out_visitor(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<String>,
    body: Option<Json<CheckTimeRequest>>,
) -> AppResult<Json<VisitorRecord>> {
    let at = body.and_then(|Json(b)| b.at).unwrap_or_else(Utc::now);
    Ok(Json(state.services.visitors.check_out(&id, at, &token).await?))
}
