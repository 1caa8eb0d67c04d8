//! Grant store boundary.
//!
//! The store owns the two base relations access is derived from: the
//! property ownership column and the grant table. It exposes them raw; it
//! never evaluates access and never calls the enforcer.

pub mod in_memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use thiserror::Error;

use rentgate_access::{AccessRows, Grant, GrantStatus, Property};
use rentgate_core::{EmailAddress, GrantId, PropertyId, UserId};

pub use in_memory::InMemoryGrantStore;
pub use postgres::PostgresGrantStore;

/// Grant store error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A non-terminal grant already exists for this invitee on this property.
    #[error("duplicate grant: a pending or active grant already exists")]
    DuplicateGrant,

    /// Compare-and-swap failed: the row is no longer in an expected status.
    #[error("status conflict: grant is {current}")]
    StatusConflict { current: GrantStatus },

    /// Revoke refused: the grant is the property's only ACTIVE OWNER grant.
    #[error("last owner grant of property {0}")]
    LastOwner(PropertyId),

    #[error("grant not found: {0}")]
    GrantNotFound(GrantId),

    #[error("property not found: {0}")]
    PropertyNotFound(PropertyId),

    /// A stored row could not be decoded into the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Backend unreachable (pool closed, connection refused, lock poisoned).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Status transition applied by [`GrantStore::transition`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// PENDING → ACTIVE, binding the accepting user. Refused if lapsed.
    Activate { user_id: UserId },
    /// → REVOKED, recording who did it.
    Revoke { actor: UserId },
    /// PENDING → EXPIRED. Only applies once the expiry has passed.
    Expire,
}

impl Transition {
    pub fn target(&self) -> GrantStatus {
        match self {
            Transition::Activate { .. } => GrantStatus::Active,
            Transition::Revoke { .. } => GrantStatus::Revoked,
            Transition::Expire => GrantStatus::Expired,
        }
    }
}

/// Persistence for properties and grants.
///
/// Every method is a single atomic unit: either the whole write lands or
/// nothing does.
#[async_trait::async_trait]
pub trait GrantStore: Send + Sync {
    /// Base relations for one user, read from a single consistent snapshot:
    /// properties the user is landlord of, plus the user's ACTIVE grants
    /// joined with their property's disabled flag.
    async fn load_access_rows(&self, user_id: UserId) -> Result<AccessRows, StoreError>;

    async fn get_property(&self, property_id: PropertyId) -> Result<Option<Property>, StoreError>;

    async fn get_grant(&self, grant_id: GrantId) -> Result<Option<Grant>, StoreError>;

    /// All grants on a property, any status, oldest first.
    async fn list_property_grants(&self, property_id: PropertyId) -> Result<Vec<Grant>, StoreError>;

    /// PENDING rows addressed to this user id or email, oldest first.
    /// Lapsed rows are included; callers apply lazy expiry.
    async fn list_invitations_for(
        &self,
        user_id: UserId,
        email: Option<&EmailAddress>,
    ) -> Result<Vec<Grant>, StoreError>;

    /// Insert a property together with its ACTIVE OWNER self-grant.
    async fn create_property(&self, property: &Property, owner_grant: &Grant) -> Result<(), StoreError>;

    /// Set or clear `disabled_at`.
    async fn set_property_disabled(
        &self,
        property_id: PropertyId,
        disabled_at: Option<DateTime<Utc>>,
    ) -> Result<Property, StoreError>;

    /// Insert a PENDING invitation.
    ///
    /// Lapsed PENDING rows for the same invitee are expired first so they do
    /// not block a re-invite. Fails with [`StoreError::DuplicateGrant`] if
    /// a non-terminal grant for the invitee remains.
    async fn insert_invitation(&self, grant: &Grant, now: DateTime<Utc>) -> Result<(), StoreError>;

    /// Compare-and-swap a grant's status.
    ///
    /// Succeeds only if the stored status is one of `expected`; otherwise
    /// returns [`StoreError::StatusConflict`] carrying the status a reader
    /// observes at `now`. Of two racing transitions, exactly one succeeds.
    ///
    /// A revoke that would leave the property with no ACTIVE OWNER grant
    /// fails with [`StoreError::LastOwner`]; the count and the update happen
    /// atomically.
    async fn transition(
        &self,
        grant_id: GrantId,
        expected: &[GrantStatus],
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Grant, StoreError>;

    /// Mark every lapsed PENDING row EXPIRED. Returns the number of rows.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait::async_trait]
impl<S> GrantStore for std::sync::Arc<S>
where
    S: GrantStore + ?Sized,
{
    async fn load_access_rows(&self, user_id: UserId) -> Result<AccessRows, StoreError> {
        (**self).load_access_rows(user_id).await
    }

    async fn get_property(&self, property_id: PropertyId) -> Result<Option<Property>, StoreError> {
        (**self).get_property(property_id).await
    }

    async fn get_grant(&self, grant_id: GrantId) -> Result<Option<Grant>, StoreError> {
        (**self).get_grant(grant_id).await
    }

    async fn list_property_grants(&self, property_id: PropertyId) -> Result<Vec<Grant>, StoreError> {
        (**self).list_property_grants(property_id).await
    }

    async fn list_invitations_for(
        &self,
        user_id: UserId,
        email: Option<&EmailAddress>,
    ) -> Result<Vec<Grant>, StoreError> {
        (**self).list_invitations_for(user_id, email).await
    }

    async fn create_property(&self, property: &Property, owner_grant: &Grant) -> Result<(), StoreError> {
        (**self).create_property(property, owner_grant).await
    }

    async fn set_property_disabled(
        &self,
        property_id: PropertyId,
        disabled_at: Option<DateTime<Utc>>,
    ) -> Result<Property, StoreError> {
        (**self).set_property_disabled(property_id, disabled_at).await
    }

    async fn insert_invitation(&self, grant: &Grant, now: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).insert_invitation(grant, now).await
    }

    async fn transition(
        &self,
        grant_id: GrantId,
        expected: &[GrantStatus],
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Grant, StoreError> {
        (**self).transition(grant_id, expected, transition, now).await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).sweep_expired(now).await
    }
}
