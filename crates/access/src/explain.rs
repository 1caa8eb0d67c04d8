//! Authorization explanation (audit trail).

use serde::Serialize;

use rentgate_core::{PropertyId, UserId};

use crate::{
    AccessIndex, AccessSource, Decision, DenyReason, Operation, OperationSet, Role, RoleRegistry,
    decide, permitted_operations,
};

/// Detailed explanation of a single authorization decision.
///
/// Answers "why was this allowed/denied?" for support tooling. Built from the
/// same index and the same [`decide`] call as the real check, so the two
/// cannot disagree.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub user_id: UserId,
    pub property_id: PropertyId,
    pub operation: Operation,
    pub granted: bool,
    pub role: Option<Role>,
    pub source: Option<AccessSource>,
    pub role_operations: OperationSet,
    pub reason: Option<DenyReason>,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// Explain why `decide(index, property_id, operation)` came out the way it did.
pub fn explain(index: &AccessIndex, property_id: PropertyId, operation: Operation) -> AccessExplanation {
    let decision = decide(index, property_id, operation);
    let entry = index.entry(property_id);
    let role = entry.map(|e| e.role);
    let role_operations = role.map(permitted_operations).unwrap_or_default();

    let (message, suggestions) = match decision {
        Decision::Allow { role } => {
            let via = match entry.map(|e| e.source) {
                Some(AccessSource::Landlord) => "landlord ownership".to_string(),
                Some(AccessSource::Grant(id)) => format!("grant {id}"),
                None => "unknown source".to_string(),
            };
            (format!("{role} permits {operation} (via {via})"), Vec::new())
        }
        Decision::Deny(DenyReason::NotAMember) => (
            "User holds no role on this property".to_string(),
            vec!["Ask an owner or property manager to invite this user".to_string()],
        ),
        Decision::Deny(DenyReason::PropertyDisabled) => (
            "Property is disabled; access is suspended for every member".to_string(),
            vec!["Ask the owner to re-enable the property".to_string()],
        ),
        Decision::Deny(reason) => {
            let granting: Vec<&str> = RoleRegistry::roles_granting(operation)
                .into_iter()
                .map(|r| r.as_str())
                .collect();
            (
                format!(
                    "{} does not permit {operation}",
                    role.map(|r| r.as_str()).unwrap_or("no role")
                ),
                vec![
                    format!("Roles permitting {operation}: {}", granting.join(", ")),
                    format!("Denied with {reason}; ask an owner to change this user's role"),
                ],
            )
        }
    };

    AccessExplanation {
        user_id: index.user_id(),
        property_id,
        operation,
        granted: decision.is_allowed(),
        role,
        source: entry.map(|e| e.source),
        role_operations,
        reason: decision.reason(),
        message,
        suggestions,
    }
}
