//! `rentgate-access`: pure property-scoped authorization (no IO).
//!
//! Layering inside this crate is strict:
//! - `evaluator` folds *base relations* ([`AccessRows`]) into an [`AccessIndex`].
//! - `enforcer` turns an [`AccessIndex`] into decisions and filtered sets.
//!
//! `evaluator` never depends on `enforcer`; enforcement output can therefore
//! never become evaluation input.

pub mod decision;
pub mod enforcer;
pub mod evaluator;
pub mod explain;
pub mod grant;
pub mod identity;
pub mod operation;
pub mod property;
pub mod registry;
pub mod role;

pub use decision::{Decision, DenyReason};
pub use enforcer::{PropertyScoped, decide, filter_by_access, filter_scoped};
pub use evaluator::{AccessEntry, AccessIndex, AccessRows, AccessSource, AccessibleProperty, GrantRow, OwnershipRow, evaluate};
pub use explain::{AccessExplanation, explain};
pub use grant::{Grant, GrantStatus, Invitee};
pub use identity::Identity;
pub use operation::{Operation, OperationSet};
pub use property::Property;
pub use registry::{RoleDefinition, RoleRegistry, permitted_operations};
pub use role::Role;
