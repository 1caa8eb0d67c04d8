//! Grant rows and the invitation state machine they carry.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentgate_core::{DomainError, EmailAddress, GrantId, PropertyId, UserId};

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Grant lifecycle status.
///
/// `Revoked` and `Expired` are terminal; a terminal row is never reactivated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantStatus {
    Pending,
    Active,
    Revoked,
    Expired,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Pending => "pending",
            GrantStatus::Active => "active",
            GrantStatus::Revoked => "revoked",
            GrantStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GrantStatus::Revoked | GrantStatus::Expired)
    }
}

impl core::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GrantStatus::Pending),
            "active" => Ok(GrantStatus::Active),
            "revoked" => Ok(GrantStatus::Revoked),
            "expired" => Ok(GrantStatus::Expired),
            other => Err(DomainError::validation(format!("unknown grant status '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invitee
// ─────────────────────────────────────────────────────────────────────────────

/// Who an invitation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Invitee {
    /// A known user identity.
    User(UserId),
    /// An email address; the user is bound when the invitation is accepted.
    Email(EmailAddress),
}

impl Invitee {
    /// Parse either a UUID (user id) or an email address.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.parse::<UserId>() {
            Ok(id) => Ok(Invitee::User(id)),
            Err(_) => EmailAddress::parse(raw).map(Invitee::Email),
        }
    }

    /// Whether an authenticated identity is this invitee.
    pub fn matches(&self, user_id: UserId, email: Option<&EmailAddress>) -> bool {
        match self {
            Invitee::User(id) => *id == user_id,
            Invitee::Email(addr) => email == Some(addr),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grant
// ─────────────────────────────────────────────────────────────────────────────

/// A `(user, property, role, status)` tuple plus invitation metadata.
///
/// # Invariants
/// - At most one PENDING/ACTIVE grant per `(user_id, property_id)` and per
///   `(invitee email, property_id)` (enforced by the store).
/// - `user_id` is set whenever `status` is ACTIVE.
/// - Only ACTIVE grants participate in access evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub grant_id: GrantId,
    pub property_id: PropertyId,
    pub invitee: Invitee,
    pub user_id: Option<UserId>,
    pub role: Role,
    pub status: GrantStatus,
    pub invited_by: UserId,
    pub invited_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<UserId>,
}

impl Grant {
    /// A new PENDING invitation.
    pub fn invitation(
        property_id: PropertyId,
        invitee: Invitee,
        role: Role,
        invited_by: UserId,
        invited_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let user_id = match &invitee {
            Invitee::User(id) => Some(*id),
            Invitee::Email(_) => None,
        };
        Self {
            grant_id: GrantId::new(),
            property_id,
            invitee,
            user_id,
            role,
            status: GrantStatus::Pending,
            invited_by,
            invited_at,
            expires_at: Some(expires_at),
            accepted_at: None,
            revoked_at: None,
            revoked_by: None,
        }
    }

    /// The ACTIVE OWNER grant seeded when a property is created.
    pub fn owner_self_grant(property_id: PropertyId, owner: UserId, at: DateTime<Utc>) -> Self {
        Self {
            grant_id: GrantId::new(),
            property_id,
            invitee: Invitee::User(owner),
            user_id: Some(owner),
            role: Role::Owner,
            status: GrantStatus::Active,
            invited_by: owner,
            invited_at: at,
            expires_at: None,
            accepted_at: Some(at),
            revoked_at: None,
            revoked_by: None,
        }
    }

    /// PENDING past its expiry; readers must treat it as EXPIRED even before
    /// the stored status catches up.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == GrantStatus::Pending && self.expires_at.is_some_and(|at| now >= at)
    }

    /// Status as any reader must observe it at `now`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> GrantStatus {
        if self.is_lapsed(now) {
            GrantStatus::Expired
        } else {
            self.status
        }
    }

    /// PENDING or ACTIVE at `now` (counts against the uniqueness invariant).
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.effective_status(now),
            GrantStatus::Pending | GrantStatus::Active
        )
    }

    /// Whether this grant occupies the uniqueness slot for `user_id`/`email`.
    pub fn targets(&self, user_id: UserId, email: Option<&EmailAddress>) -> bool {
        self.user_id == Some(user_id) || self.invitee.matches(user_id, email)
    }
}
