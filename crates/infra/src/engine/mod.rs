//! Store-backed access engine.
//!
//! Data flows one way: [`GrantStore`](crate::grant_store::GrantStore) →
//! [`AccessEvaluator`] → [`PolicyEnforcer`]. The evaluator only ever calls
//! `load_access_rows`; the enforcer only ever consumes the evaluator's index.

pub mod enforcer;
pub mod evaluator;

pub use enforcer::{AccessScope, PolicyEnforcer};
pub use evaluator::AccessEvaluator;
