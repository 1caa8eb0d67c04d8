use tracing::{debug, instrument};

use rentgate_access::{
    AccessExplanation, AccessIndex, AccessibleProperty, Decision, Operation, PropertyScoped, Role,
    decide, explain, filter_by_access, filter_scoped,
};
use rentgate_core::{PropertyId, UserId};

use crate::grant_store::StoreError;

use super::AccessEvaluator;

/// Request-scoped, precomputed access for one user.
///
/// Obtain one per request via [`PolicyEnforcer::scope`] and reuse it for
/// every check in that request; each check is then O(1) with no IO.
#[derive(Debug, Clone)]
pub struct AccessScope {
    index: AccessIndex,
}

impl AccessScope {
    pub fn new(index: AccessIndex) -> Self {
        Self { index }
    }

    pub fn user_id(&self) -> UserId {
        self.index.user_id()
    }

    pub fn index(&self) -> &AccessIndex {
        &self.index
    }

    pub fn authorize(&self, property_id: PropertyId, operation: Operation) -> Decision {
        let decision = decide(&self.index, property_id, operation);
        if let Decision::Deny(reason) = decision {
            debug!(
                user_id = %self.index.user_id(),
                property_id = %property_id,
                operation = %operation,
                reason = %reason,
                "access denied"
            );
        }
        decision
    }

    pub fn role_for(&self, property_id: PropertyId) -> Option<Role> {
        self.index.role_for(property_id)
    }

    pub fn properties(&self) -> Vec<AccessibleProperty> {
        self.index.properties()
    }

    pub fn filter_by_access<I>(&self, candidates: I) -> Vec<PropertyId>
    where
        I: IntoIterator<Item = PropertyId>,
    {
        filter_by_access(&self.index, candidates)
    }

    pub fn filter_scoped<T, I>(&self, items: I, operation: Operation) -> Vec<T>
    where
        T: PropertyScoped,
        I: IntoIterator<Item = T>,
    {
        filter_scoped(&self.index, items, operation)
    }

    pub fn explain(&self, property_id: PropertyId, operation: Operation) -> AccessExplanation {
        explain(&self.index, property_id, operation)
    }
}

/// Gates and filters property-scoped operations.
///
/// Every method evaluates once and then decides purely; there is no path
/// from a decision back into evaluation.
#[derive(Debug, Clone)]
pub struct PolicyEnforcer {
    evaluator: AccessEvaluator,
}

impl PolicyEnforcer {
    pub fn new(evaluator: AccessEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    pub async fn scope(&self, user_id: UserId) -> Result<AccessScope, StoreError> {
        Ok(AccessScope::new(self.evaluator.index(user_id).await?))
    }

    #[instrument(skip(self), fields(user_id = %user_id, property_id = %property_id, operation = %operation), err)]
    pub async fn authorize(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        operation: Operation,
    ) -> Result<Decision, StoreError> {
        Ok(self.scope(user_id).await?.authorize(property_id, operation))
    }

    /// Keep the candidates the user may view. One evaluation per call.
    pub async fn filter_by_access(
        &self,
        user_id: UserId,
        candidates: Vec<PropertyId>,
    ) -> Result<Vec<PropertyId>, StoreError> {
        Ok(self.scope(user_id).await?.filter_by_access(candidates))
    }

    pub async fn explain(
        &self,
        user_id: UserId,
        property_id: PropertyId,
        operation: Operation,
    ) -> Result<AccessExplanation, StoreError> {
        Ok(self.scope(user_id).await?.explain(property_id, operation))
    }
}
