use axum::{
    Json, Router,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use serde::{Deserialize, Serialize};

use gatehouse_core::{Page, paginate};
use gatehouse_infra::StoreError;

use crate::app::errors;
use crate::middleware::{self, RouteGuard};

pub mod auth;
pub mod permissions;
pub mod roles;
pub mod system;
pub mod users;

/// The guards protected routes are built with.
pub struct RouteGuards {
    /// Any valid token.
    pub authenticated: RouteGuard,
    pub edit_permissions_user: RouteGuard,
    pub create_user: RouteGuard,
    pub create_role: RouteGuard,
}

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
}

/// Endpoints behind a token. Reads of users and roles only need an
/// authenticated caller; writes need the matching create permission.
pub fn protected_router(guards: &RouteGuards) -> Router {
    Router::new()
        .route("/whoami", guarded(get(system::whoami), &guards.authenticated))
        .route(
            "/permissions",
            guarded(get(permissions::list_permissions), &guards.edit_permissions_user),
        )
        .route(
            "/users",
            guarded(get(users::list_users), &guards.authenticated)
                .merge(guarded(post(users::create_user), &guards.create_user)),
        )
        .route(
            "/roles",
            guarded(get(roles::list_roles), &guards.authenticated)
                .merge(guarded(post(roles::create_role), &guards.create_role)),
        )
}

fn guarded(route: MethodRouter, guard: &RouteGuard) -> MethodRouter {
    route.route_layer(axum::middleware::from_fn_with_state(
        guard.clone(),
        middleware::guard_middleware,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> Page {
        let default = Page::default();
        Page {
            page: self.page.unwrap_or(default.page),
            limit: self.limit.unwrap_or(default.limit),
        }
    }
}

/// One page of a listing, or the store/pagination error as a response.
fn page_response<T: Serialize>(query: &PageQuery, rows: Result<Vec<T>, StoreError>) -> Response {
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => return errors::store_error_to_response(e),
    };

    match paginate(query.page(), rows) {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
