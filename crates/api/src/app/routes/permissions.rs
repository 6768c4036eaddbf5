//! Read access to the persisted permission catalog.

use std::sync::Arc;

use axum::extract::{Extension, Query};

use gatehouse_infra::IdentityStore;

use super::{PageQuery, page_response};
use crate::app::services::AppServices;

/// GET /permissions - catalog rows ordered by code, paginated.
pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<PageQuery>,
) -> axum::response::Response {
    page_response(&query, services.store.list_permissions().await)
}
