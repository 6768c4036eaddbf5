use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};
use serde::Deserialize;

use crate::app::{errors, services::AppServices};

/// `identifier` is a username, or an email when it contains `@`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<LoginRequest>,
) -> axum::response::Response {
    match services.login.login(&body.identifier, &body.password).await {
        Ok(pair) => Json(pair).into_response(),
        Err(e) => errors::login_error_to_response(e),
    }
}
