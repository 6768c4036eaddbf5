use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use gatehouse_auth::{Clock, JwtValidator, RequiredPermissions, explain_authorization};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub clock: Arc<dyn Clock>,
}

/// Per-route guard: token validation plus the route's permission requirement.
///
/// Build the requirement with `PermissionCatalog::require` so that unknown
/// codes fail router construction.
#[derive(Clone)]
pub struct RouteGuard {
    auth: AuthState,
    required: RequiredPermissions,
}

impl RouteGuard {
    pub fn new(auth: AuthState, required: RequiredPermissions) -> Self {
        Self { auth, required }
    }
}

/// Rejects with 401 on a missing or invalid token and 403 on a denied
/// decision. Both carry the same body; only the status differs.
pub async fn guard_middleware(
    State(guard): State<RouteGuard>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let bearer = extract_bearer(req.headers()).ok_or_else(|| reject(StatusCode::UNAUTHORIZED))?;

    let claims = guard
        .auth
        .jwt
        .validate(bearer, guard.auth.clock.now())
        .map_err(|e| {
            debug!(reason = %e, "bearer token rejected");
            reject(StatusCode::UNAUTHORIZED)
        })?;

    let explanation = explain_authorization(&claims, &guard.required);
    if let Err(e) = explanation.decision.into_result() {
        debug!(account_id = %claims.sub, reason = ?explanation.reason, error = %e, "request denied");
        return Err(reject(StatusCode::FORBIDDEN));
    }

    req.extensions_mut().insert(PrincipalContext::from(claims));
    Ok(next.run(req).await)
}

fn reject(status: StatusCode) -> Response {
    json_error(status, "unauthorized", "unauthorized")
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?.trim();
    if header.is_empty() {
        return None;
    }
    Some(header)
}
