//! Enforcement over a precomputed [`AccessIndex`].
//!
//! Everything here consumes an index; nothing here produces one.

use rentgate_core::PropertyId;

use crate::{AccessIndex, Decision, DenyReason, Operation, permitted_operations};

/// Anything that lives under a property (units, tenants, leases, documents).
pub trait PropertyScoped {
    fn property_id(&self) -> PropertyId;
}

impl PropertyScoped for PropertyId {
    fn property_id(&self) -> PropertyId {
        *self
    }
}

/// Decide whether the indexed user may perform `operation` on `property_id`.
///
/// - No IO
/// - No panics
/// - Denial is a value
pub fn decide(index: &AccessIndex, property_id: PropertyId, operation: Operation) -> Decision {
    let Some(role) = index.role_for(property_id) else {
        if index.is_disabled_membership(property_id) {
            return Decision::Deny(DenyReason::PropertyDisabled);
        }
        return Decision::Deny(DenyReason::NotAMember);
    };

    if permitted_operations(role).contains(operation) {
        Decision::Allow { role }
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

/// Keep the candidate property ids the indexed user may view.
///
/// O(n) membership checks against one index; order and duplicates of the
/// input are preserved.
pub fn filter_by_access<I>(index: &AccessIndex, candidates: I) -> Vec<PropertyId>
where
    I: IntoIterator<Item = PropertyId>,
{
    filter_scoped(index, candidates, Operation::ViewProperty)
}

/// Keep the items whose property permits `operation` for the indexed user.
pub fn filter_scoped<T, I>(index: &AccessIndex, items: I, operation: Operation) -> Vec<T>
where
    T: PropertyScoped,
    I: IntoIterator<Item = T>,
{
    items
        .into_iter()
        .filter(|item| decide(index, item.property_id(), operation).is_allowed())
        .collect()
}
