use axum::{routing::get, Router};

pub mod access;
pub mod grants;
pub mod invitations;
pub mod properties;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/roles", get(system::roles))
        .nest("/properties", properties::router())
        .nest("/invitations", invitations::router())
        .nest("/grants", grants::router())
        .nest("/access", access::router())
}
