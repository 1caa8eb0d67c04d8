//! Access evaluation: base relations in, [`AccessIndex`] out.
//!
//! This module is a leaf. It reads nothing but the two base relations handed
//! to it (landlord ownership and raw grant rows) and has no knowledge of the
//! enforcement layer, so a filtered view can never feed back into it.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use rentgate_core::{GrantId, PropertyId, UserId};

use crate::{GrantStatus, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Base relations
// ─────────────────────────────────────────────────────────────────────────────

/// A property whose `landlord_id` is the evaluated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRow {
    pub property_id: PropertyId,
    pub disabled: bool,
}

/// A raw grant row for the evaluated user, joined to its property's
/// `disabled_at` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    pub grant_id: GrantId,
    pub property_id: PropertyId,
    pub role: Role,
    pub status: GrantStatus,
    pub property_disabled: bool,
}

/// Everything evaluation needs for one user, read in one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRows {
    pub user_id: UserId,
    pub owned: Vec<OwnershipRow>,
    pub grants: Vec<GrantRow>,
}

impl AccessRows {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            owned: Vec::new(),
            grants: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Index
// ─────────────────────────────────────────────────────────────────────────────

/// Where an effective role came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "grant_id", rename_all = "snake_case")]
pub enum AccessSource {
    Landlord,
    Grant(GrantId),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub role: Role,
    pub source: AccessSource,
}

/// One `(property_id, role)` pair of the boundary contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccessibleProperty {
    pub property_id: PropertyId,
    pub role: Role,
}

/// A user's accessible properties and effective role per property.
///
/// Derived, never persisted. Disabled properties are excluded from the
/// accessible set but remembered separately so members can be told
/// `PROPERTY_DISABLED` instead of `NOT_A_MEMBER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIndex {
    user_id: UserId,
    entries: HashMap<PropertyId, AccessEntry>,
    disabled: HashSet<PropertyId>,
}

impl AccessIndex {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn entry(&self, property_id: PropertyId) -> Option<&AccessEntry> {
        self.entries.get(&property_id)
    }

    pub fn role_for(&self, property_id: PropertyId) -> Option<Role> {
        self.entries.get(&property_id).map(|e| e.role)
    }

    pub fn contains(&self, property_id: PropertyId) -> bool {
        self.entries.contains_key(&property_id)
    }

    /// The user would have access here if the property were not disabled.
    pub fn is_disabled_membership(&self, property_id: PropertyId) -> bool {
        self.disabled.contains(&property_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accessible properties, sorted by property id for stable output.
    pub fn properties(&self) -> Vec<AccessibleProperty> {
        let mut out: Vec<AccessibleProperty> = self
            .entries
            .iter()
            .map(|(property_id, entry)| AccessibleProperty {
                property_id: *property_id,
                role: entry.role,
            })
            .collect();
        out.sort_by_key(|p| p.property_id);
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// Fold base relations into an [`AccessIndex`].
///
/// Single pass, no IO, deterministic:
/// 1. landlord ownership of an enabled property → OWNER
/// 2. ACTIVE grant on an enabled property → grant role
/// 3. collisions resolve to the higher-ranked role; on equal rank the
///    landlord source is kept
pub fn evaluate(rows: &AccessRows) -> AccessIndex {
    let mut entries: HashMap<PropertyId, AccessEntry> = HashMap::new();
    let mut disabled: HashSet<PropertyId> = HashSet::new();

    for owned in &rows.owned {
        if owned.disabled {
            disabled.insert(owned.property_id);
            continue;
        }
        entries.insert(
            owned.property_id,
            AccessEntry {
                role: Role::Owner,
                source: AccessSource::Landlord,
            },
        );
    }

    for grant in &rows.grants {
        if grant.status != GrantStatus::Active {
            continue;
        }
        if grant.property_disabled {
            disabled.insert(grant.property_id);
            continue;
        }

        let candidate = AccessEntry {
            role: grant.role,
            source: AccessSource::Grant(grant.grant_id),
        };

        match entries.get_mut(&grant.property_id) {
            None => {
                entries.insert(grant.property_id, candidate);
            }
            Some(existing) => {
                if let AccessSource::Grant(other) = existing.source {
                    // The store keeps one open grant per (user, property).
                    tracing::warn!(
                        user_id = %rows.user_id,
                        property_id = %grant.property_id,
                        grant_id = %grant.grant_id,
                        other_grant_id = %other,
                        "multiple active grants for one property"
                    );
                }
                if grant.role.rank() > existing.role.rank() {
                    *existing = candidate;
                }
            }
        }
    }

    AccessIndex {
        user_id: rows.user_id,
        entries,
        disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn owned(property_id: PropertyId) -> OwnershipRow {
        OwnershipRow {
            property_id,
            disabled: false,
        }
    }

    fn grant(property_id: PropertyId, role: Role, status: GrantStatus) -> GrantRow {
        GrantRow {
            grant_id: GrantId::new(),
            property_id,
            role,
            status,
            property_disabled: false,
        }
    }

    #[test]
    fn landlord_is_owner() {
        let user = UserId::new();
        let p = PropertyId::new();
        let rows = AccessRows {
            user_id: user,
            owned: vec![owned(p)],
            grants: vec![],
        };

        let index = evaluate(&rows);
        assert_eq!(index.role_for(p), Some(Role::Owner));
        assert_eq!(index.entry(p).unwrap().source, AccessSource::Landlord);
    }

    #[test]
    fn landlord_is_not_downgraded_by_weaker_grant() {
        let user = UserId::new();
        let p = PropertyId::new();
        let rows = AccessRows {
            user_id: user,
            owned: vec![owned(p)],
            grants: vec![grant(p, Role::Viewer, GrantStatus::Active)],
        };

        assert_eq!(evaluate(&rows).role_for(p), Some(Role::Owner));
    }

    #[test]
    fn only_active_grants_count() {
        let user = UserId::new();
        let pending = PropertyId::new();
        let revoked = PropertyId::new();
        let expired = PropertyId::new();
        let active = PropertyId::new();
        let rows = AccessRows {
            user_id: user,
            owned: vec![],
            grants: vec![
                grant(pending, Role::Owner, GrantStatus::Pending),
                grant(revoked, Role::Owner, GrantStatus::Revoked),
                grant(expired, Role::Owner, GrantStatus::Expired),
                grant(active, Role::LeasingAgent, GrantStatus::Active),
            ],
        };

        let index = evaluate(&rows);
        assert_eq!(index.len(), 1);
        assert_eq!(index.role_for(active), Some(Role::LeasingAgent));
    }

    #[test]
    fn disabled_properties_are_excluded_but_remembered() {
        let user = UserId::new();
        let owned_disabled = PropertyId::new();
        let granted_disabled = PropertyId::new();
        let mut g = grant(granted_disabled, Role::Viewer, GrantStatus::Active);
        g.property_disabled = true;
        let rows = AccessRows {
            user_id: user,
            owned: vec![OwnershipRow {
                property_id: owned_disabled,
                disabled: true,
            }],
            grants: vec![g],
        };

        let index = evaluate(&rows);
        assert!(index.is_empty());
        assert!(index.is_disabled_membership(owned_disabled));
        assert!(index.is_disabled_membership(granted_disabled));
    }

    #[test]
    fn conflicting_grants_resolve_to_highest_rank() {
        let user = UserId::new();
        let p = PropertyId::new();
        let rows = AccessRows {
            user_id: user,
            owned: vec![],
            grants: vec![
                grant(p, Role::Viewer, GrantStatus::Active),
                grant(p, Role::PropertyManager, GrantStatus::Active),
                grant(p, Role::LeasingAgent, GrantStatus::Active),
            ],
        };

        assert_eq!(evaluate(&rows).role_for(p), Some(Role::PropertyManager));
    }

    #[test]
    fn properties_are_sorted_and_complete() {
        let user = UserId::new();
        let a = PropertyId::new();
        let b = PropertyId::new();
        let rows = AccessRows {
            user_id: user,
            owned: vec![owned(b)],
            grants: vec![grant(a, Role::Viewer, GrantStatus::Active)],
        };

        let listed = evaluate(&rows).properties();
        assert_eq!(listed.len(), 2);
        assert!(listed.windows(2).all(|w| w[0].property_id <= w[1].property_id));
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn status_strategy() -> impl Strategy<Value = GrantStatus> {
        prop::sample::select(vec![
            GrantStatus::Pending,
            GrantStatus::Active,
            GrantStatus::Revoked,
            GrantStatus::Expired,
        ])
    }

    const POOL: usize = 6;

    /// Rows over a small pool of properties so collisions are common. The
    /// disabled flag is drawn per property, not per row.
    fn rows_strategy() -> impl Strategy<Value = AccessRows> {
        (
            prop::collection::vec(any::<bool>(), POOL),
            prop::collection::vec(0..POOL, 0..4),
            prop::collection::vec((0..POOL, role_strategy(), status_strategy()), 0..10),
        )
            .prop_map(|(disabled, owned, grants)| {
                let pool: Vec<PropertyId> = (0..POOL).map(|_| PropertyId::new()).collect();
                AccessRows {
                    user_id: UserId::new(),
                    owned: owned
                        .into_iter()
                        .map(|i| OwnershipRow {
                            property_id: pool[i],
                            disabled: disabled[i],
                        })
                        .collect(),
                    grants: grants
                        .into_iter()
                        .map(|(i, role, status)| GrantRow {
                            grant_id: GrantId::new(),
                            property_id: pool[i],
                            role,
                            status,
                            property_disabled: disabled[i],
                        })
                        .collect(),
                }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: evaluation is a function of its input snapshot.
        #[test]
        fn evaluation_is_idempotent(rows in rows_strategy()) {
            prop_assert_eq!(evaluate(&rows), evaluate(&rows));
        }

        /// Property: input row order does not change the outcome.
        #[test]
        fn evaluation_ignores_row_order(rows in rows_strategy()) {
            let mut reversed = rows.clone();
            reversed.owned.reverse();
            reversed.grants.reverse();
            prop_assert_eq!(evaluate(&rows).properties(), evaluate(&reversed).properties());
        }

        /// Property: OWNER iff landlord of an enabled property or holder of an
        /// ACTIVE OWNER grant on an enabled property.
        #[test]
        fn owner_iff_landlord_or_active_owner_grant(rows in rows_strategy()) {
            let index = evaluate(&rows);
            for p in index.properties() {
                let landlord = rows.owned.iter().any(|o| o.property_id == p.property_id && !o.disabled);
                let owner_grant = rows.grants.iter().any(|g| {
                    g.property_id == p.property_id
                        && g.status == GrantStatus::Active
                        && g.role == Role::Owner
                        && !g.property_disabled
                });
                prop_assert_eq!(p.role == Role::Owner, landlord || owner_grant);
            }
        }

        /// Property: nothing disabled is ever accessible.
        #[test]
        fn disabled_never_accessible(rows in rows_strategy()) {
            let index = evaluate(&rows);
            for o in rows.owned.iter().filter(|o| o.disabled) {
                prop_assert!(!index.contains(o.property_id));
            }
            for g in rows.grants.iter().filter(|g| g.property_disabled) {
                prop_assert!(!index.contains(g.property_id));
            }
        }
    }
}
