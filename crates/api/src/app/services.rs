use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use rentgate_infra::{
    AccessEvaluator, GrantStore, InMemoryGrantStore, InvitationWorkflow, PolicyEnforcer,
    PostgresGrantStore, Settings, StoreError,
};

/// Engine + workflow sharing one injected grant store.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub enforcer: PolicyEnforcer,
    pub workflow: InvitationWorkflow,
}

impl AppServices {
    pub fn new(store: Arc<dyn GrantStore>, invitation_ttl: Duration) -> Self {
        let enforcer = PolicyEnforcer::new(AccessEvaluator::new(store.clone()));
        let workflow = InvitationWorkflow::new(store, enforcer.clone(), invitation_ttl);
        Self { enforcer, workflow }
    }

    /// In-memory services (tests/dev).
    pub fn in_memory(invitation_ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryGrantStore::new()), invitation_ttl)
    }

    /// Postgres when `DATABASE_URL` is set, otherwise in-memory.
    pub async fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        let store: Arc<dyn GrantStore> = match &settings.database_url {
            Some(url) => {
                let store = PostgresGrantStore::connect(url, settings.db_max_connections).await?;
                store.migrate().await?;
                info!("using postgres grant store");
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set; using in-memory grant store");
                Arc::new(InMemoryGrantStore::new())
            }
        };
        Ok(Self::new(store, settings.invitation_ttl))
    }
}
