//! HTTP application wiring (axum router, guards, shared services).
//!
//! - `services.rs`: dependencies shared by handlers (store, login, directory, validator)
//! - `routes/`: handlers and the guard each method sits behind
//! - `errors.rs`: consistent JSON error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use gatehouse_auth::{CatalogError, permissions::codes};

use crate::middleware::RouteGuard;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router.
///
/// Route requirements are resolved against the services' catalog here, so a
/// route naming an undeclared permission code fails construction.
pub fn build_app(services: Arc<AppServices>) -> Result<Router, CatalogError> {
    let guard = |required: &[&str]| -> Result<RouteGuard, CatalogError> {
        Ok(RouteGuard::new(
            services.auth.clone(),
            services.catalog.require(required)?,
        ))
    };
    let guards = routes::RouteGuards {
        authenticated: guard(&[])?,
        edit_permissions_user: guard(&[codes::EDIT_PERMISSIONS_USER])?,
        create_user: guard(&[codes::CREATE_USER])?,
        create_role: guard(&[codes::CREATE_ROLE])?,
    };

    Ok(routes::public_router()
        .merge(routes::protected_router(&guards))
        .layer(ServiceBuilder::new().layer(Extension(services))))
}
