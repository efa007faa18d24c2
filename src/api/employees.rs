//! Employee directory endpoint (host picker on the compose view)

use axum::{extract::State, Json};

use crate::{error::AppResult, models::EmployeeRecord, AppState};

use super::BearerToken;

/// List employees
#[utoipa::path(
    get,
    path = "/employees",
    tag = "employees",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Employee directory", body = Vec<EmployeeRecord>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_employees(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<Vec<EmployeeRecord>>> {
    Ok(Json(state.services.directory.list(&token).await?))
}
