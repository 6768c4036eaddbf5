use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "account_id": principal.account_id().to_string(),
        "issuer": principal.issuer(),
        "is_superuser": principal.is_superuser(),
        "permissions": principal.permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
