use serde::{Deserialize, Serialize};

use rentgate_core::{EmailAddress, UserId};

/// Authenticated caller as asserted by the external auth provider.
///
/// The engine never sees credentials; it trusts this value once the transport
/// layer has verified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    /// Verified email, when the provider supplies one. Needed to accept
    /// invitations addressed by email.
    pub email: Option<EmailAddress>,
}

impl Identity {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
        }
    }

    pub fn with_email(mut self, email: EmailAddress) -> Self {
        self.email = Some(email);
        self
    }
}
