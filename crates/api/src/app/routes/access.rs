use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use rentgate_access::Operation;
use rentgate_core::PropertyId;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::app::dto;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/filter", post(filter))
}

/// Narrow a candidate id list to what the caller may act on.
///
/// Malformed ids are rejected up front rather than silently dropped.
pub async fn filter(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::FilterRequest>,
) -> axum::response::Response {
    let candidates = match body
        .property_ids
        .iter()
        .map(|raw| dto::parse_id::<PropertyId>(raw, "property"))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let operation = match body.operation.as_deref().map(dto::parse_operation) {
        None => Operation::ViewProperty,
        Some(Ok(op)) => op,
        Some(Err(resp)) => return resp,
    };

    let scope = match services.enforcer.scope(principal.user_id()).await {
        Ok(scope) => scope,
        Err(e) => return errors::store_error_to_response(e),
    };
    let allowed = scope.filter_scoped(candidates, operation);

    Json(serde_json::json!({ "property_ids": allowed })).into_response()
}
