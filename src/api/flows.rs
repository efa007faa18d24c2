//! Registration flow endpoints (compose -> preview -> share)

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Local;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::VisitorFormData,
    services::flow::{FlowSnapshot, InviteResponse, PreviewResponse, ShareLink},
    AppState,
};

use super::BearerToken;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PreviewQuery {
    /// Render this persisted visitor instead of the draft
    pub visitor_id: Option<String>,
}

/// Open a registration flow
#[utoipa::path(
    post,
    path = "/flows",
    tag = "flows",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Flow opened", body = FlowSnapshot),
        (status = 409, description = "Too many open flows")
    )
)]
pub async fn open_flow(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<(StatusCode, Json<FlowSnapshot>)> {
    let snapshot = state.services.flows.open(&token).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Current flow state
#[utoipa::path(
    get,
    path = "/flows/{id}",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Flow state", body = FlowSnapshot),
        (status = 404, description = "Flow not found")
    )
)]
pub async fn get_flow(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FlowSnapshot>> {
    state.services.flows.authorize(id, &token).await?;
    Ok(Json(state.services.flows.snapshot(id).await?))
}

/// Close a flow, discarding its draft and resolved images
#[utoipa::path(
    delete,
    path = "/flows/{id}",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    responses(
        (status = 204, description = "Flow closed"),
        (status = 404, description = "Flow not found")
    )
)]
pub async fn close_flow(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.flows.authorize(id, &token).await?;
    state.services.flows.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Draft for the compose view
#[utoipa::path(
    get,
    path = "/flows/{id}/draft",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Current draft, or null", body = Option<VisitorFormData>)
    )
)]
pub async fn get_draft(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Option<VisitorFormData>>> {
    state.services.flows.authorize(id, &token).await?;
    Ok(Json(state.services.flows.draft(id).await?))
}

/// Validate and store the compose form
#[utoipa::path(
    put,
    path = "/flows/{id}/draft",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    request_body = VisitorFormData,
    responses(
        (status = 200, description = "Draft stored", body = FlowSnapshot),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn compose(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
    Json(form): Json<VisitorFormData>,
) -> AppResult<Json<FlowSnapshot>> {
    state.services.flows.authorize(id, &token).await?;
    let now = Local::now().naive_local();
    Ok(Json(state.services.flows.compose(id, form, now).await?))
}

/// Preview the visitor about to be invited
#[utoipa::path(
    get,
    path = "/flows/{id}/preview",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID"), PreviewQuery),
    responses(
        (status = 200, description = "Preview", body = PreviewResponse)
    )
)]
pub async fn preview(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
    Query(query): Query<PreviewQuery>,
) -> AppResult<Json<PreviewResponse>> {
    state.services.flows.authorize(id, &token).await?;
    let visitor_id = query.visitor_id.filter(|v| !v.trim().is_empty());
    Ok(Json(state.services.flows.preview(id, visitor_id, &token).await?))
}

/// Invite (or re-invite) the drafted visitor
#[utoipa::path(
    post,
    path = "/flows/{id}/invite",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Visitor invited", body = InviteResponse),
        (status = 400, description = "No draft to invite"),
        (status = 502, description = "Visitor API rejected the invite")
    )
)]
pub async fn invite(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
) -> AppResult<Json<InviteResponse>> {
    state.services.flows.authorize(id, &token).await?;
    Ok(Json(state.services.flows.invite(id, &token).await?))
}

/// Share the visitor pass and finish the flow
#[utoipa::path(
    post,
    path = "/flows/{id}/share",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Share link", body = ShareLink),
        (status = 400, description = "Visitor not invited yet")
    )
)]
pub async fn share(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ShareLink>> {
    state.services.flows.authorize(id, &token).await?;
    Ok(Json(state.services.flows.share(id).await?))
}

/// Abandon the draft
#[utoipa::path(
    post,
    path = "/flows/{id}/cancel",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Flow reset", body = FlowSnapshot)
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FlowSnapshot>> {
    state.services.flows.authorize(id, &token).await?;
    Ok(Json(state.services.flows.cancel(id).await?))
}

/// Image bytes behind a `blob:` URL handed out by a preview
#[utoipa::path(
    get,
    path = "/flows/{id}/blobs/{blob_id}",
    tag = "flows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Flow ID"),
        ("blob_id" = Uuid, Path, description = "Blob ID")
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "Blob not found or released")
    )
)]
pub async fn get_blob(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Path((id, blob_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    state.services.flows.authorize(id, &token).await?;
    let blob = state.services.flows.blob(id, blob_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
        ],
        blob.bytes,
    ))
}
