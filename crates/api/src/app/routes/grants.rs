use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use rentgate_core::GrantId;
use rentgate_infra::RevokeGrant;

use crate::app::errors::{self, DenialSurface};
use crate::app::services::AppServices;
use crate::app::dto;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/:id/revoke", post(revoke_grant))
}

pub async fn revoke_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let grant_id: GrantId = match dto::parse_id(&id, "grant") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = RevokeGrant {
        actor: principal.user_id(),
        grant_id,
        occurred_at: Utc::now(),
    };

    match services.workflow.revoke(cmd).await {
        Ok(grant) => Json(dto::grant_to_json(&grant)).into_response(),
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::Forbidden),
    }
}
