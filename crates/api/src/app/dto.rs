use std::str::FromStr;

use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use rentgate_access::{Decision, Grant, Invitee, Operation, Property, RoleDefinition, Role};
use rentgate_core::DomainError;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    /// User id (UUID) or email address.
    pub invitee: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct OperationQuery {
    pub operation: String,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub property_ids: Vec<String>,
    /// Defaults to VIEW_PROPERTY.
    pub operation: Option<String>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path/body identifier, answering 400 on failure.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

pub fn parse_operation(raw: &str) -> Result<Operation, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_invite(body: &InviteRequest) -> Result<(Invitee, Role), axum::response::Response> {
    let invitee = Invitee::parse(&body.invitee).map_err(errors::domain_error_to_response)?;
    let role = body.role.parse().map_err(errors::domain_error_to_response)?;
    Ok((invitee, role))
}

// -------------------------
// Response mapping
// -------------------------

pub fn property_to_json(p: &Property) -> serde_json::Value {
    json!({
        "property_id": p.property_id,
        "landlord_id": p.landlord_id,
        "name": p.name,
        "created_at": p.created_at,
        "disabled": p.is_disabled(),
    })
}

pub fn decision_to_json(decision: Decision) -> serde_json::Value {
    match decision {
        Decision::Allow { role } => json!({ "allow": true, "role": role }),
        Decision::Deny(reason) => json!({ "allow": false, "reason": reason }),
    }
}

pub fn invitation_to_json(g: &Grant) -> serde_json::Value {
    json!({
        "invitation_id": g.grant_id,
        "property_id": g.property_id,
        "invitee": g.invitee,
        "role": g.role,
        "status": g.status,
        "invited_by": g.invited_by,
        "invited_at": g.invited_at,
        "expires_at": g.expires_at,
    })
}

pub fn grant_to_json(g: &Grant) -> serde_json::Value {
    json!({
        "grant_id": g.grant_id,
        "property_id": g.property_id,
        "user_id": g.user_id,
        "invitee": g.invitee,
        "role": g.role,
        "status": g.status,
        "invited_by": g.invited_by,
        "invited_at": g.invited_at,
        "expires_at": g.expires_at,
        "accepted_at": g.accepted_at,
        "revoked_at": g.revoked_at,
        "revoked_by": g.revoked_by,
    })
}

pub fn role_definition_to_json(def: &RoleDefinition) -> serde_json::Value {
    json!({
        "role": def.role,
        "rank": def.rank,
        "operations": def.operations,
        "description": def.description,
    })
}
