use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use rentgate_core::GrantId;
use rentgate_infra::RespondToInvitation;

use crate::app::errors::{self, DenialSurface};
use crate::app::services::AppServices;
use crate::app::dto;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_pending))
        .route("/:id/accept", post(accept_invitation))
        .route("/:id/decline", post(decline_invitation))
}

pub async fn list_pending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services
        .workflow
        .pending_for(&principal.identity(), Utc::now())
        .await
    {
        Ok(grants) => {
            let invitations: Vec<_> = grants.iter().map(dto::invitation_to_json).collect();
            Json(serde_json::json!({ "invitations": invitations })).into_response()
        }
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::Forbidden),
    }
}

pub async fn accept_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = match respond_command(&principal, &id) {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };

    match services.workflow.accept(cmd).await {
        Ok(grant) => Json(serde_json::json!({
            "grant_id": grant.grant_id,
            "property_id": grant.property_id,
            "role": grant.role,
            "status": grant.status,
        }))
        .into_response(),
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::Forbidden),
    }
}

pub async fn decline_invitation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd = match respond_command(&principal, &id) {
        Ok(cmd) => cmd,
        Err(resp) => return resp,
    };

    match services.workflow.decline(cmd).await {
        Ok(grant) => Json(dto::invitation_to_json(&grant)).into_response(),
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::Forbidden),
    }
}

fn respond_command(
    principal: &PrincipalContext,
    id: &str,
) -> Result<RespondToInvitation, axum::response::Response> {
    let grant_id: GrantId = dto::parse_id(id, "invitation")?;
    Ok(RespondToInvitation {
        identity: principal.identity(),
        grant_id,
        occurred_at: Utc::now(),
    })
}
