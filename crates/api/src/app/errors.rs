use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gatehouse_core::DomainError;
use gatehouse_infra::{DirectoryError, LoginError, StoreError};

pub fn login_error_to_response(err: LoginError) -> axum::response::Response {
    match err {
        LoginError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid username or password",
        ),
        LoginError::Inactive => json_error(StatusCode::FORBIDDEN, "inactive_account", "account is inactive"),
        LoginError::Store(e) => store_error_to_response(e),
        LoginError::Issue(e) => {
            tracing::error!(error = %e, "token issuance failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "issue_error", "could not issue token")
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "identity store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "identity store unavailable")
}

pub fn directory_error_to_response(err: DirectoryError) -> axum::response::Response {
    match err {
        DirectoryError::Domain(e) => domain_error_to_response(e),
        DirectoryError::WeakPassword(e) => json_error(StatusCode::BAD_REQUEST, "weak_password", e.to_string()),
        DirectoryError::UnknownPermission(e) => {
            json_error(StatusCode::BAD_REQUEST, "unknown_permission", e.to_string())
        }
        DirectoryError::UnknownRole(id) => {
            json_error(StatusCode::BAD_REQUEST, "unknown_role", format!("role {id} does not exist"))
        }
        DirectoryError::Forbidden(_) => json_error(
            StatusCode::FORBIDDEN,
            "role_not_held",
            "roles can only be granted by an account that holds them",
        ),
        DirectoryError::Hashing(e) => {
            tracing::error!(error = %e, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "hashing_error", "could not store password")
        }
        DirectoryError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
