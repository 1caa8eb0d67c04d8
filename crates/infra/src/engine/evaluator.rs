use std::sync::Arc;

use tracing::instrument;

use rentgate_access::{AccessIndex, AccessibleProperty, Role, evaluate};
use rentgate_core::{PropertyId, UserId};

use crate::grant_store::{GrantStore, StoreError};

/// Computes a user's accessible properties and effective roles.
///
/// Each call performs exactly one store read and folds it with the pure
/// [`evaluate`]. Nothing is cached between calls, so a revocation is visible
/// to the very next evaluation.
#[derive(Clone)]
pub struct AccessEvaluator {
    store: Arc<dyn GrantStore>,
}

impl AccessEvaluator {
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }

    /// Build the full access index for `user_id`.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn index(&self, user_id: UserId) -> Result<AccessIndex, StoreError> {
        let rows = self.store.load_access_rows(user_id).await?;
        Ok(evaluate(&rows))
    }

    /// `[(property_id, role)]`, sorted by property id.
    pub async fn accessible_properties(&self, user_id: UserId) -> Result<Vec<AccessibleProperty>, StoreError> {
        Ok(self.index(user_id).await?.properties())
    }

    /// Effective role on one property, or `None` for non-members.
    pub async fn role_for(&self, user_id: UserId, property_id: PropertyId) -> Result<Option<Role>, StoreError> {
        Ok(self.index(user_id).await?.role_for(property_id))
    }

    pub async fn is_member(&self, user_id: UserId, property_id: PropertyId) -> Result<bool, StoreError> {
        Ok(self.role_for(user_id, property_id).await?.is_some())
    }
}

impl std::fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessEvaluator").finish_non_exhaustive()
    }
}
