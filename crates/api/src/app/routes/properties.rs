use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use rentgate_core::PropertyId;
use rentgate_infra::{CreateProperty, InviteMember, SetPropertyDisabled};

use crate::app::errors::{self, DenialSurface};
use crate::app::services::AppServices;
use crate::app::dto;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_property).get(list_properties))
        .route("/:id", axum::routing::delete(disable_property))
        .route("/:id/restore", post(restore_property))
        .route("/:id/authorize", get(authorize))
        .route("/:id/explain", get(explain))
        .route("/:id/members", get(list_members))
        .route("/:id/invitations", post(invite_member))
}

pub async fn list_properties(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services
        .enforcer
        .evaluator()
        .accessible_properties(principal.user_id())
        .await
    {
        Ok(properties) => Json(serde_json::json!({ "properties": properties })).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePropertyRequest>,
) -> axum::response::Response {
    let cmd = CreateProperty {
        creator: principal.user_id(),
        name: body.name,
        occurred_at: Utc::now(),
    };

    match services.workflow.create_property(cmd).await {
        Ok(property) => (StatusCode::CREATED, Json(dto::property_to_json(&property))).into_response(),
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::Forbidden),
    }
}

pub async fn authorize(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::OperationQuery>,
) -> axum::response::Response {
    let property_id: PropertyId = match dto::parse_id(&id, "property") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let operation = match dto::parse_operation(&query.operation) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .enforcer
        .authorize(principal.user_id(), property_id, operation)
        .await
    {
        Ok(decision) => Json(dto::decision_to_json(decision)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::OperationQuery>,
) -> axum::response::Response {
    let property_id: PropertyId = match dto::parse_id(&id, "property") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let operation = match dto::parse_operation(&query.operation) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .enforcer
        .explain(principal.user_id(), property_id, operation)
        .await
    {
        Ok(explanation) => Json(explanation).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let property_id: PropertyId = match dto::parse_id(&id, "property") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .workflow
        .members(principal.user_id(), property_id, Utc::now())
        .await
    {
        Ok(grants) => {
            let members: Vec<_> = grants.iter().map(dto::grant_to_json).collect();
            Json(serde_json::json!({ "members": members })).into_response()
        }
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::NotFound),
    }
}

pub async fn invite_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InviteRequest>,
) -> axum::response::Response {
    let property_id: PropertyId = match dto::parse_id(&id, "property") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (invitee, role) = match dto::parse_invite(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = InviteMember {
        inviter: principal.user_id(),
        property_id,
        invitee,
        role,
        occurred_at: Utc::now(),
    };

    match services.workflow.invite(cmd).await {
        Ok(grant) => (StatusCode::CREATED, Json(dto::invitation_to_json(&grant))).into_response(),
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::Forbidden),
    }
}

pub async fn disable_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_disabled(&services, &principal, &id, true).await
}

pub async fn restore_property(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    set_disabled(&services, &principal, &id, false).await
}

async fn set_disabled(
    services: &AppServices,
    principal: &PrincipalContext,
    id: &str,
    disabled: bool,
) -> axum::response::Response {
    let property_id: PropertyId = match dto::parse_id(id, "property") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = SetPropertyDisabled {
        actor: principal.user_id(),
        property_id,
        disabled,
        occurred_at: Utc::now(),
    };

    match services.workflow.set_property_disabled(cmd).await {
        Ok(property) => Json(dto::property_to_json(&property)).into_response(),
        Err(e) => errors::workflow_error_to_response(e, DenialSurface::NotFound),
    }
}
