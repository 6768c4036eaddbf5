use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use gatehouse_core::RoleId;
use gatehouse_infra::{Actor, IdentityStore, NewUser};

use super::{PageQuery, page_response};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    /// Roles to grant; a non-superuser caller must hold each of them.
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

/// GET /users - accounts ordered by username, paginated.
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<PageQuery>,
) -> axum::response::Response {
    page_response(&query, services.store.list_accounts().await)
}

/// POST /users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateUserRequest>,
) -> axum::response::Response {
    let actor = Actor {
        account_id: principal.account_id(),
        is_superuser: principal.is_superuser(),
    };
    let user = NewUser {
        username: body.username,
        email: body.email,
        password: body.password,
        first_name: body.first_name,
        last_name: body.last_name,
        phone: body.phone,
        roles: body.roles,
    };

    match services.directory.create_account(&actor, user).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}
