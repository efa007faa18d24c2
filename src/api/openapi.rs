//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{employees, flows, health, visitors};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Visitor Desk API",
        version = "0.1.0",
        description = "Host-initiated visitor registration flow"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Flows
        flows::open_flow,
        flows::get_flow,
        flows::close_flow,
        flows::get_draft,
        flows::compose,
        flows::preview,
        flows::invite,
        flows::share,
        flows::cancel,
        flows::get_blob,
        // Visitors
        visitors::list_visitors,
        visitors::last_visits,
        visitors::get_visitor,
        visitors::approve_visitor,
        visitors::reject_visitor,
        visitors::check_in_visitor,
        visitors::check_out_visitor,
        // Employees
        employees::list_employees,
    ),
    components(
        schemas(
            // Visitors
            crate::models::visitor::VisitorRecord,
            crate::models::visitor::VisitorFormData,
            crate::models::visitor::VisitorStatus,
            crate::models::visitor::Guest,
            crate::models::visitor::Asset,
            crate::models::visitor::AssetType,
            crate::models::visitor::HostDetails,
            crate::models::visitor::CreatedVisitor,
            crate::models::employee::EmployeeRecord,
            visitors::CheckTimeRequest,
            // Flows
            crate::services::flow::FlowSnapshot,
            crate::services::flow::PreviewResponse,
            crate::services::flow::InviteResponse,
            crate::services::flow::ShareLink,
            crate::models::preview::DisplayVisitor,
            crate::models::preview::DisplayImage,
            crate::models::preview::DisplayGuest,
            crate::models::preview::DisplayAsset,
            crate::models::preview::DisplayHost,
            crate::models::preview::AssetGroups,
            crate::models::preview::PreviewSource,
            crate::models::image::ImageKind,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "flows", description = "Visitor registration flow"),
        (name = "visitors", description = "Visitor history and status"),
        (name = "employees", description = "Employee directory")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
