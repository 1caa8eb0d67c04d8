//! Infrastructure layer: grant storage, the store-backed access engine, the
//! invitation workflow and configuration.

pub mod config;
pub mod engine;
pub mod grant_store;
pub mod invitations;


pub use config::{ConfigError, Settings};
pub use engine::{AccessEvaluator, AccessScope, PolicyEnforcer};
pub use grant_store::{GrantStore, InMemoryGrantStore, PostgresGrantStore, StoreError, Transition};
pub use invitations::{
    CreateProperty, InvitationWorkflow, InviteMember, RespondToInvitation, RevokeGrant,
    SetPropertyDisabled, WorkflowError,
};
