use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, warn};

use rentgate_access::DenyReason;
use rentgate_core::DomainError;
use rentgate_infra::{StoreError, WorkflowError};

/// How a call site reports "you are not a member here".
///
/// `NotFound` hides the property's existence from non-members; `Forbidden`
/// reports the denial reason as-is.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DenialSurface {
    Forbidden,
    NotFound,
}

pub fn deny_to_response(reason: DenyReason, surface: DenialSurface) -> axum::response::Response {
    if surface == DenialSurface::NotFound && reason == DenyReason::NotAMember {
        return json_error(StatusCode::NOT_FOUND, "not_found", "not found");
    }

    let status = match reason {
        DenyReason::NotAMember
        | DenyReason::InsufficientRole
        | DenyReason::PropertyDisabled
        | DenyReason::NotInvitee
        | DenyReason::RoleEscalation => StatusCode::FORBIDDEN,
        DenyReason::DuplicateGrant
        | DenyReason::AlreadyAccepted
        | DenyReason::GrantNotRevocable
        | DenyReason::LastOwner => {
            StatusCode::CONFLICT
        }
        DenyReason::InvitationExpired | DenyReason::InvitationRevoked => StatusCode::GONE,
    };
    json_error(status, reason.code(), deny_message(reason))
}

fn deny_message(reason: DenyReason) -> &'static str {
    match reason {
        DenyReason::NotAMember => "you hold no role on this property",
        DenyReason::InsufficientRole => "your role does not permit this operation",
        DenyReason::PropertyDisabled => "this property is disabled",
        DenyReason::DuplicateGrant => "a pending or active grant already exists for this invitee",
        DenyReason::InvitationExpired => "this invitation has expired",
        DenyReason::NotInvitee => "this invitation is addressed to someone else",
        DenyReason::AlreadyAccepted => "this invitation was already accepted",
        DenyReason::InvitationRevoked => "this invitation was revoked or declined",
        DenyReason::RoleEscalation => "you cannot grant or revoke a role above your own",
        DenyReason::GrantNotRevocable => "this grant is already revoked or expired",
        DenyReason::LastOwner => "a property must keep at least one active owner grant",
    }
}

pub fn workflow_error_to_response(err: WorkflowError, surface: DenialSurface) -> axum::response::Response {
    match err {
        WorkflowError::Denied(reason) => deny_to_response(reason, surface),
        WorkflowError::GrantNotFound(_) | WorkflowError::PropertyNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        WorkflowError::Domain(e) => domain_error_to_response(e),
        WorkflowError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Unavailable(msg) => {
            warn!(error = %msg, "grant store unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "storage temporarily unavailable",
            )
        }
        other => {
            error!(error = %other, "grant store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage error",
            )
        }
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
