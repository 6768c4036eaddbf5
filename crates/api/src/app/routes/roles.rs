use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use gatehouse_infra::IdentityStore;

use super::{PageQuery, page_response};
use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    /// Permission codes; each must be in the catalog.
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// GET /roles - roles with their permissions, ordered by name, paginated.
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<PageQuery>,
) -> axum::response::Response {
    page_response(&query, services.store.list_roles().await)
}

/// POST /roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateRoleRequest>,
) -> axum::response::Response {
    match services.directory.create_role(&body.name, &body.permissions).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}
