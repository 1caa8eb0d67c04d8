use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use rentgate_access::RoleRegistry;

use crate::app::dto;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id().to_string(),
        "email": principal.email().map(|e| e.as_str().to_string()),
    }))
}

pub async fn roles() -> impl IntoResponse {
    let roles: Vec<_> = RoleRegistry::definitions()
        .iter()
        .map(dto::role_definition_to_json)
        .collect();
    Json(serde_json::json!({ "roles": roles }))
}
