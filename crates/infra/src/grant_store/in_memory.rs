use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use rentgate_access::{AccessRows, Grant, GrantRow, GrantStatus, Invitee, OwnershipRow, Property, Role};
use rentgate_core::{EmailAddress, GrantId, PropertyId, UserId};

use super::{GrantStore, StoreError, Transition};

#[derive(Debug, Default)]
struct State {
    properties: HashMap<PropertyId, Property>,
    grants: HashMap<GrantId, Grant>,
}

/// In-memory grant store.
///
/// Intended for tests/dev. Reads take the read lock once, so an evaluation
/// sees one consistent snapshot; every mutation runs under a single write
/// lock, which makes status transitions a true compare-and-swap.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    state: RwLock<State>,
}

impl InMemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

/// Whether `existing` holds the uniqueness slot `candidate` wants.
///
/// Mirrors the two partial unique indexes of the Postgres schema: one on
/// `(property, user_id)` and one on `(property, invitee email)`.
fn occupies(existing: &Grant, candidate: &Grant) -> bool {
    if existing.property_id != candidate.property_id {
        return false;
    }
    let same_user = existing.user_id.is_some() && existing.user_id == candidate.user_id;
    let same_email = matches!(
        (&existing.invitee, &candidate.invitee),
        (Invitee::Email(a), Invitee::Email(b)) if a == b
    );
    same_user || same_email
}

fn sorted(mut grants: Vec<Grant>) -> Vec<Grant> {
    grants.sort_by(|a, b| {
        a.invited_at
            .cmp(&b.invited_at)
            .then_with(|| a.grant_id.cmp(&b.grant_id))
    });
    grants
}

fn expire_lapsed<'a>(grants: impl Iterator<Item = &'a mut Grant>, now: DateTime<Utc>) -> u64 {
    let mut count = 0;
    for grant in grants {
        if grant.is_lapsed(now) {
            grant.status = GrantStatus::Expired;
            count += 1;
        }
    }
    count
}

#[async_trait::async_trait]
impl GrantStore for InMemoryGrantStore {
    async fn load_access_rows(&self, user_id: UserId) -> Result<AccessRows, StoreError> {
        let state = self.read()?;

        let owned = state
            .properties
            .values()
            .filter(|p| p.landlord_id == user_id)
            .map(|p| OwnershipRow {
                property_id: p.property_id,
                disabled: p.is_disabled(),
            })
            .collect();

        let mut grants = Vec::new();
        for grant in state.grants.values() {
            if grant.user_id != Some(user_id) || grant.status != GrantStatus::Active {
                continue;
            }
            let property = state.properties.get(&grant.property_id).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "grant {} references missing property {}",
                    grant.grant_id, grant.property_id
                ))
            })?;
            grants.push(GrantRow {
                grant_id: grant.grant_id,
                property_id: grant.property_id,
                role: grant.role,
                status: grant.status,
                property_disabled: property.is_disabled(),
            });
        }

        Ok(AccessRows {
            user_id,
            owned,
            grants,
        })
    }

    async fn get_property(&self, property_id: PropertyId) -> Result<Option<Property>, StoreError> {
        Ok(self.read()?.properties.get(&property_id).cloned())
    }

    async fn get_grant(&self, grant_id: GrantId) -> Result<Option<Grant>, StoreError> {
        Ok(self.read()?.grants.get(&grant_id).cloned())
    }

    async fn list_property_grants(&self, property_id: PropertyId) -> Result<Vec<Grant>, StoreError> {
        let state = self.read()?;
        let grants = state
            .grants
            .values()
            .filter(|g| g.property_id == property_id)
            .cloned()
            .collect();
        Ok(sorted(grants))
    }

    async fn list_invitations_for(
        &self,
        user_id: UserId,
        email: Option<&EmailAddress>,
    ) -> Result<Vec<Grant>, StoreError> {
        let state = self.read()?;
        let grants = state
            .grants
            .values()
            .filter(|g| g.status == GrantStatus::Pending && g.invitee.matches(user_id, email))
            .cloned()
            .collect();
        Ok(sorted(grants))
    }

    async fn create_property(&self, property: &Property, owner_grant: &Grant) -> Result<(), StoreError> {
        if owner_grant.property_id != property.property_id {
            return Err(StoreError::Storage(
                "owner grant must target the new property".to_string(),
            ));
        }

        let mut state = self.write()?;
        if state.properties.contains_key(&property.property_id) {
            return Err(StoreError::Storage(format!(
                "property already exists: {}",
                property.property_id
            )));
        }
        state.properties.insert(property.property_id, property.clone());
        state.grants.insert(owner_grant.grant_id, owner_grant.clone());
        Ok(())
    }

    async fn set_property_disabled(
        &self,
        property_id: PropertyId,
        disabled_at: Option<DateTime<Utc>>,
    ) -> Result<Property, StoreError> {
        let mut state = self.write()?;
        let property = state
            .properties
            .get_mut(&property_id)
            .ok_or(StoreError::PropertyNotFound(property_id))?;
        property.disabled_at = disabled_at;
        Ok(property.clone())
    }

    async fn insert_invitation(&self, grant: &Grant, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.properties.contains_key(&grant.property_id) {
            return Err(StoreError::PropertyNotFound(grant.property_id));
        }
        if state.grants.contains_key(&grant.grant_id) {
            return Err(StoreError::Storage(format!(
                "grant already exists: {}",
                grant.grant_id
            )));
        }

        expire_lapsed(
            state.grants.values_mut().filter(|g| occupies(g, grant)),
            now,
        );

        let duplicate = state.grants.values().any(|g| {
            matches!(g.status, GrantStatus::Pending | GrantStatus::Active) && occupies(g, grant)
        });
        if duplicate {
            return Err(StoreError::DuplicateGrant);
        }

        state.grants.insert(grant.grant_id, grant.clone());
        Ok(())
    }

    async fn transition(
        &self,
        grant_id: GrantId,
        expected: &[GrantStatus],
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Grant, StoreError> {
        let mut state = self.write()?;
        let current = state
            .grants
            .get(&grant_id)
            .ok_or(StoreError::GrantNotFound(grant_id))?;

        let timing_ok = match transition {
            Transition::Expire => current.is_lapsed(now),
            Transition::Activate { .. } | Transition::Revoke { .. } => !current.is_lapsed(now),
        };
        if !expected.contains(&current.status) || !timing_ok {
            return Err(StoreError::StatusConflict {
                current: current.effective_status(now),
            });
        }

        if matches!(transition, Transition::Revoke { .. })
            && current.role == Role::Owner
            && current.status == GrantStatus::Active
        {
            let property_id = current.property_id;
            let other_owners = state.grants.values().any(|g| {
                g.grant_id != grant_id
                    && g.property_id == property_id
                    && g.role == Role::Owner
                    && g.status == GrantStatus::Active
            });
            if !other_owners {
                return Err(StoreError::LastOwner(property_id));
            }
        }

        if let Transition::Activate { user_id } = transition {
            let property_id = current.property_id;
            let taken = state.grants.values().any(|g| {
                g.grant_id != grant_id
                    && g.property_id == property_id
                    && g.user_id == Some(user_id)
                    && g.is_open(now)
            });
            if taken {
                return Err(StoreError::DuplicateGrant);
            }
        }

        let grant = state
            .grants
            .get_mut(&grant_id)
            .ok_or(StoreError::GrantNotFound(grant_id))?;
        grant.status = transition.target();
        match transition {
            Transition::Activate { user_id } => {
                grant.user_id = Some(user_id);
                grant.accepted_at = Some(now);
            }
            Transition::Revoke { actor } => {
                grant.revoked_at = Some(now);
                grant.revoked_by = Some(actor);
            }
            Transition::Expire => {}
        }
        Ok(grant.clone())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        Ok(expire_lapsed(state.grants.values_mut(), now))
    }
}
