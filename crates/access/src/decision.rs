use serde::{Deserialize, Serialize};

use crate::Role;

/// Machine-readable reason for a denial.
///
/// The wire form is the SCREAMING_SNAKE_CASE code (`NOT_A_MEMBER`, ...).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// The user holds no role on the property.
    NotAMember,
    /// The user's role does not include the operation.
    InsufficientRole,
    /// The property is soft-deleted.
    PropertyDisabled,
    /// A PENDING or ACTIVE grant already exists for the invitee.
    DuplicateGrant,
    /// The invitation lapsed before acceptance.
    InvitationExpired,
    /// The caller is not the invitee.
    NotInvitee,
    /// The invitation was already accepted.
    AlreadyAccepted,
    /// The invitation was revoked or declined.
    InvitationRevoked,
    /// The target role outranks the actor's own role.
    RoleEscalation,
    /// The grant is already in a terminal state.
    GrantNotRevocable,
    /// Revoking would leave the property without an ACTIVE OWNER grant.
    LastOwner,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NotAMember => "NOT_A_MEMBER",
            DenyReason::InsufficientRole => "INSUFFICIENT_ROLE",
            DenyReason::PropertyDisabled => "PROPERTY_DISABLED",
            DenyReason::DuplicateGrant => "DUPLICATE_GRANT",
            DenyReason::InvitationExpired => "INVITATION_EXPIRED",
            DenyReason::NotInvitee => "NOT_INVITEE",
            DenyReason::AlreadyAccepted => "ALREADY_ACCEPTED",
            DenyReason::InvitationRevoked => "INVITATION_REVOKED",
            DenyReason::RoleEscalation => "ROLE_ESCALATION",
            DenyReason::GrantNotRevocable => "GRANT_NOT_REVOCABLE",
            DenyReason::LastOwner => "LAST_OWNER",
        }
    }
}

impl core::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of an authorization check. Denial is a value, not an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { role: Role },
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow { .. } => None,
            Decision::Deny(reason) => Some(*reason),
        }
    }

    /// Convert into a `Result` for `?`-style call sites.
    pub fn into_result(self) -> Result<Role, DenyReason> {
        match self {
            Decision::Allow { role } => Ok(role),
            Decision::Deny(reason) => Err(reason),
        }
    }
}
