//! Invitation workflow: the only writer of grant rows.
//!
//! State machine:
//! - PENDING → ACTIVE (accept, invitee only)
//! - PENDING → REVOKED, ACTIVE → REVOKED (revoke, MANAGE_USERS; or decline by the invitee)
//! - PENDING → EXPIRED (time; applied lazily on read and eagerly by the sweep)
//!
//! Every command authorizes before it mutates, and every mutation is a single
//! store call, so a failed command leaves nothing behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use rentgate_access::{
    DenyReason, Grant, GrantStatus, Identity, Invitee, Operation, Property, Role,
};
use rentgate_core::{DomainError, GrantId, PropertyId, UserId};

use crate::engine::PolicyEnforcer;
use crate::grant_store::{GrantStore, StoreError, Transition};

const MAX_PROPERTY_NAME_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Business-rule refusal. Not an infrastructure fault.
    #[error("denied: {0}")]
    Denied(DenyReason),

    #[error("grant not found: {0}")]
    GrantNotFound(GrantId),

    #[error("property not found: {0}")]
    PropertyNotFound(PropertyId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateGrant => WorkflowError::Denied(DenyReason::DuplicateGrant),
            StoreError::LastOwner(_) => WorkflowError::Denied(DenyReason::LastOwner),
            StoreError::GrantNotFound(id) => WorkflowError::GrantNotFound(id),
            StoreError::PropertyNotFound(id) => WorkflowError::PropertyNotFound(id),
            other => WorkflowError::Store(other),
        }
    }
}

impl From<DenyReason> for WorkflowError {
    fn from(reason: DenyReason) -> Self {
        WorkflowError::Denied(reason)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CreateProperty {
    pub creator: UserId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InviteMember {
    pub inviter: UserId,
    pub property_id: PropertyId,
    pub invitee: Invitee,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RespondToInvitation {
    pub identity: Identity,
    pub grant_id: GrantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RevokeGrant {
    pub actor: UserId,
    pub grant_id: GrantId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SetPropertyDisabled {
    pub actor: UserId,
    pub property_id: PropertyId,
    pub disabled: bool,
    pub occurred_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct InvitationWorkflow {
    store: Arc<dyn GrantStore>,
    enforcer: PolicyEnforcer,
    invitation_ttl: Duration,
}

impl InvitationWorkflow {
    pub fn new(store: Arc<dyn GrantStore>, enforcer: PolicyEnforcer, invitation_ttl: Duration) -> Self {
        Self {
            store,
            enforcer,
            invitation_ttl,
        }
    }

    pub fn invitation_ttl(&self) -> Duration {
        self.invitation_ttl
    }

    /// Create a property and its ACTIVE OWNER self-grant atomically.
    pub async fn create_property(&self, cmd: CreateProperty) -> Result<Property, WorkflowError> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("property name must not be empty").into());
        }
        if name.chars().count() > MAX_PROPERTY_NAME_LEN {
            return Err(DomainError::validation(format!(
                "property name must be at most {MAX_PROPERTY_NAME_LEN} characters"
            ))
            .into());
        }

        let property = Property::new(cmd.creator, name, cmd.occurred_at);
        let owner_grant = Grant::owner_self_grant(property.property_id, cmd.creator, cmd.occurred_at);
        self.store.create_property(&property, &owner_grant).await?;

        info!(
            property_id = %property.property_id,
            landlord_id = %property.landlord_id,
            "property created"
        );
        Ok(property)
    }

    /// Invite a user (by id or email) to a property with `role`.
    pub async fn invite(&self, cmd: InviteMember) -> Result<Grant, WorkflowError> {
        let scope = self.enforcer.scope(cmd.inviter).await?;
        let inviter_role = scope
            .authorize(cmd.property_id, Operation::ManageUsers)
            .into_result()?;

        if !inviter_role.can_delegate(cmd.role) {
            return Err(DenyReason::RoleEscalation.into());
        }

        if let Invitee::User(user_id) = cmd.invitee {
            // Inviter and landlord already hold access.
            if user_id == cmd.inviter {
                return Err(DenyReason::DuplicateGrant.into());
            }
            let property = self
                .store
                .get_property(cmd.property_id)
                .await?
                .ok_or(WorkflowError::PropertyNotFound(cmd.property_id))?;
            if property.landlord_id == user_id {
                return Err(DenyReason::DuplicateGrant.into());
            }
        }

        let grant = Grant::invitation(
            cmd.property_id,
            cmd.invitee,
            cmd.role,
            cmd.inviter,
            cmd.occurred_at,
            cmd.occurred_at + self.invitation_ttl,
        );
        self.store.insert_invitation(&grant, cmd.occurred_at).await?;

        info!(
            grant_id = %grant.grant_id,
            property_id = %grant.property_id,
            role = %grant.role,
            invited_by = %grant.invited_by,
            "invitation created"
        );
        Ok(grant)
    }

    /// Accept an invitation as its invitee.
    ///
    /// Of two concurrent accepts of the same invitation exactly one succeeds;
    /// the other is denied with `ALREADY_ACCEPTED`.
    pub async fn accept(&self, cmd: RespondToInvitation) -> Result<Grant, WorkflowError> {
        let now = cmd.occurred_at;
        let grant = self.invitee_grant(&cmd).await?;

        match grant.effective_status(now) {
            GrantStatus::Pending => {}
            GrantStatus::Expired => {
                self.mark_expired(&grant, now).await;
                return Err(DenyReason::InvitationExpired.into());
            }
            other => return Err(conflict_reason(other).into()),
        }

        let property = self
            .store
            .get_property(grant.property_id)
            .await?
            .ok_or(WorkflowError::PropertyNotFound(grant.property_id))?;
        if property.is_disabled() {
            return Err(DenyReason::PropertyDisabled.into());
        }

        let accepted = self
            .store
            .transition(
                grant.grant_id,
                &[GrantStatus::Pending],
                Transition::Activate {
                    user_id: cmd.identity.user_id,
                },
                now,
            )
            .await
            .map_err(transition_error(conflict_reason))?;

        info!(
            grant_id = %accepted.grant_id,
            property_id = %accepted.property_id,
            user_id = %cmd.identity.user_id,
            role = %accepted.role,
            "invitation accepted"
        );
        Ok(accepted)
    }

    /// Turn an invitation down. The row becomes REVOKED with the invitee as
    /// `revoked_by`.
    pub async fn decline(&self, cmd: RespondToInvitation) -> Result<Grant, WorkflowError> {
        let now = cmd.occurred_at;
        let grant = self.invitee_grant(&cmd).await?;

        match grant.effective_status(now) {
            GrantStatus::Pending => {}
            other => return Err(conflict_reason(other).into()),
        }

        let declined = self
            .store
            .transition(
                grant.grant_id,
                &[GrantStatus::Pending],
                Transition::Revoke {
                    actor: cmd.identity.user_id,
                },
                now,
            )
            .await
            .map_err(transition_error(conflict_reason))?;

        info!(grant_id = %declined.grant_id, "invitation declined");
        Ok(declined)
    }

    /// Revoke a PENDING or ACTIVE grant. Takes effect on the next evaluation.
    ///
    /// Non-members of the grant's property get `GrantNotFound`, the same as
    /// for an unknown id. The property's last ACTIVE OWNER grant cannot be
    /// revoked (`LAST_OWNER`).
    pub async fn revoke(&self, cmd: RevokeGrant) -> Result<Grant, WorkflowError> {
        let now = cmd.occurred_at;
        let grant = self
            .store
            .get_grant(cmd.grant_id)
            .await?
            .ok_or(WorkflowError::GrantNotFound(cmd.grant_id))?;

        let scope = self.enforcer.scope(cmd.actor).await?;
        let actor_role = match scope
            .authorize(grant.property_id, Operation::ManageUsers)
            .into_result()
        {
            Ok(role) => role,
            Err(DenyReason::NotAMember) => return Err(WorkflowError::GrantNotFound(cmd.grant_id)),
            Err(reason) => return Err(reason.into()),
        };

        if !actor_role.can_delegate(grant.role) {
            return Err(DenyReason::RoleEscalation.into());
        }
        if grant.effective_status(now).is_terminal() {
            return Err(DenyReason::GrantNotRevocable.into());
        }

        let revoked = self
            .store
            .transition(
                grant.grant_id,
                &[GrantStatus::Pending, GrantStatus::Active],
                Transition::Revoke { actor: cmd.actor },
                now,
            )
            .await
            .map_err(transition_error(|_| DenyReason::GrantNotRevocable))?;

        info!(
            grant_id = %revoked.grant_id,
            property_id = %revoked.property_id,
            revoked_by = %cmd.actor,
            "grant revoked"
        );
        Ok(revoked)
    }

    /// Soft-delete or restore a property.
    ///
    /// The landlord may always toggle their own property; anyone else needs
    /// DELETE_PROPERTY, which a disabled property never grants.
    pub async fn set_property_disabled(&self, cmd: SetPropertyDisabled) -> Result<Property, WorkflowError> {
        let property = self
            .store
            .get_property(cmd.property_id)
            .await?
            .ok_or(WorkflowError::PropertyNotFound(cmd.property_id))?;

        if property.landlord_id != cmd.actor {
            self.enforcer
                .scope(cmd.actor)
                .await?
                .authorize(cmd.property_id, Operation::DeleteProperty)
                .into_result()?;
        }

        let disabled_at = cmd.disabled.then_some(cmd.occurred_at);
        let updated = self
            .store
            .set_property_disabled(cmd.property_id, disabled_at)
            .await?;

        info!(
            property_id = %updated.property_id,
            disabled = updated.is_disabled(),
            actor = %cmd.actor,
            "property availability changed"
        );
        Ok(updated)
    }

    /// The caller's open invitations. Lapsed rows are EXPIRED, so they are
    /// left out rather than listed.
    pub async fn pending_for(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Vec<Grant>, WorkflowError> {
        let grants = self
            .store
            .list_invitations_for(identity.user_id, identity.email.as_ref())
            .await?;
        Ok(grants
            .into_iter()
            .filter(|g| g.effective_status(now) == GrantStatus::Pending)
            .collect())
    }

    /// All grants on a property, with lapsed invitations reported EXPIRED.
    pub async fn members(
        &self,
        actor: UserId,
        property_id: PropertyId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Grant>, WorkflowError> {
        self.enforcer
            .scope(actor)
            .await?
            .authorize(property_id, Operation::ManageUsers)
            .into_result()?;

        let grants = self.store.list_property_grants(property_id).await?;
        Ok(grants
            .into_iter()
            .map(|mut g| {
                g.status = g.effective_status(now);
                g
            })
            .collect())
    }

    /// Mark all lapsed invitations EXPIRED. Meant for a periodic scheduler.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, WorkflowError> {
        let expired = self.store.sweep_expired(now).await?;
        if expired > 0 {
            info!(expired, "expired lapsed invitations");
        }
        Ok(expired)
    }

    async fn invitee_grant(&self, cmd: &RespondToInvitation) -> Result<Grant, WorkflowError> {
        let grant = self
            .store
            .get_grant(cmd.grant_id)
            .await?
            .ok_or(WorkflowError::GrantNotFound(cmd.grant_id))?;

        if !grant
            .invitee
            .matches(cmd.identity.user_id, cmd.identity.email.as_ref())
        {
            return Err(DenyReason::NotInvitee.into());
        }
        Ok(grant)
    }

    async fn mark_expired(&self, grant: &Grant, now: DateTime<Utc>) {
        if grant.status != GrantStatus::Pending {
            return;
        }
        match self
            .store
            .transition(grant.grant_id, &[GrantStatus::Pending], Transition::Expire, now)
            .await
        {
            Ok(_) | Err(StoreError::StatusConflict { .. }) => {}
            Err(err) => warn!(grant_id = %grant.grant_id, error = %err, "failed to mark invitation expired"),
        }
    }
}

impl std::fmt::Debug for InvitationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvitationWorkflow")
            .field("invitation_ttl", &self.invitation_ttl)
            .finish_non_exhaustive()
    }
}

/// Why an invitation in `status` cannot be answered.
fn conflict_reason(status: GrantStatus) -> DenyReason {
    match status {
        GrantStatus::Active => DenyReason::AlreadyAccepted,
        GrantStatus::Revoked => DenyReason::InvitationRevoked,
        GrantStatus::Pending | GrantStatus::Expired => DenyReason::InvitationExpired,
    }
}

fn transition_error(reason: impl Fn(GrantStatus) -> DenyReason) -> impl Fn(StoreError) -> WorkflowError {
    move |err| match err {
        StoreError::StatusConflict { current } => WorkflowError::Denied(reason(current)),
        other => other.into(),
    }
}
