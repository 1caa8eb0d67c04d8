//! Static role → operation table.

use serde::Serialize;

use crate::{Operation, OperationSet, Role};

/// Operations authorized by `role`.
///
/// Pure lookup; OWNER implies every operation.
pub fn permitted_operations(role: Role) -> OperationSet {
    use Operation::*;

    match role {
        Role::Owner => OperationSet::all(),
        Role::PropertyManager => OperationSet::of(&[
            ViewProperty,
            EditProperty,
            ManageUnits,
            ManageTenants,
            ManageUsers,
            ViewFinancials,
        ]),
        Role::LeasingAgent => OperationSet::of(&[ViewProperty, ManageTenants]),
        Role::Viewer => OperationSet::of(&[ViewProperty]),
    }
}

/// Role definition with its granted operations (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub role: Role,
    pub rank: u8,
    pub operations: OperationSet,
    pub description: &'static str,
}

/// Read-only view of the role table.
pub struct RoleRegistry;

impl RoleRegistry {
    /// Every role, highest privilege first.
    pub fn definitions() -> Vec<RoleDefinition> {
        Role::ALL
            .into_iter()
            .map(|role| RoleDefinition {
                role,
                rank: role.rank(),
                operations: permitted_operations(role),
                description: role_description(role),
            })
            .collect()
    }

    /// Lowest-ranked roles that would authorize `op`.
    pub fn roles_granting(op: Operation) -> Vec<Role> {
        let mut roles: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|r| permitted_operations(*r).contains(op))
            .collect();
        roles.sort_by_key(|r| r.rank());
        roles
    }
}

fn role_description(role: Role) -> &'static str {
    match role {
        Role::Owner => "Full control of the property, including deletion and member management",
        Role::PropertyManager => "Day-to-day operations: units, tenants, members and financials",
        Role::LeasingAgent => "Views the property and manages tenants and applicants",
        Role::Viewer => "Read-only access to the property",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_permits_everything() {
        assert_eq!(permitted_operations(Role::Owner), OperationSet::all());
    }

    #[test]
    fn only_owner_deletes() {
        assert_eq!(RoleRegistry::roles_granting(Operation::DeleteProperty), vec![Role::Owner]);
    }

    #[test]
    fn higher_rank_is_superset_of_lower() {
        let ordered = [Role::Viewer, Role::LeasingAgent, Role::PropertyManager, Role::Owner];
        for pair in ordered.windows(2) {
            let lower = permitted_operations(pair[0]);
            let higher = permitted_operations(pair[1]);
            assert!(lower.iter().all(|op| higher.contains(op)), "{} ⊄ {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn every_role_can_view() {
        for role in Role::ALL {
            assert!(permitted_operations(role).contains(Operation::ViewProperty));
        }
    }

    #[test]
    fn definitions_list_all_roles() {
        let defs = RoleRegistry::definitions();
        assert_eq!(defs.len(), Role::ALL.len());
        assert_eq!(defs[0].role, Role::Owner);
    }
}
