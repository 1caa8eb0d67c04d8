use core::str::FromStr;

use serde::{Deserialize, Serialize};

use rentgate_core::DomainError;

/// Property-scoped role (closed enumeration).
///
/// Unknown role names are rejected at parse time; there is no catch-all
/// variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    PropertyManager,
    LeasingAgent,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Owner,
        Role::PropertyManager,
        Role::LeasingAgent,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::PropertyManager => "PROPERTY_MANAGER",
            Role::LeasingAgent => "LEASING_AGENT",
            Role::Viewer => "VIEWER",
        }
    }

    /// Privilege rank; higher outranks lower.
    ///
    /// Used for evaluation tie-breaks and for the escalation guard on
    /// invite/revoke.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Owner => 3,
            Role::PropertyManager => 2,
            Role::LeasingAgent => 1,
            Role::Viewer => 0,
        }
    }

    /// Whether a holder of `self` may hand out (or take away) `other`.
    pub fn can_delegate(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }

    /// The higher-privileged of two roles.
    pub fn max_privilege(self, other: Role) -> Role {
        if other.rank() > self.rank() { other } else { self }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OWNER" => Ok(Role::Owner),
            "PROPERTY_MANAGER" => Ok(Role::PropertyManager),
            "LEASING_AGENT" => Ok(Role::LeasingAgent),
            "VIEWER" => Ok(Role::Viewer),
            _ => Err(DomainError::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("property_manager".parse::<Role>().unwrap(), Role::PropertyManager);
        assert_eq!(" VIEWER ".parse::<Role>().unwrap(), Role::Viewer);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err, DomainError::UnknownRole("superuser".to_string()));
    }

    #[test]
    fn unknown_role_is_rejected_by_serde() {
        assert!(serde_json::from_str::<Role>("\"ADMIN\"").is_err());
        assert_eq!(
            serde_json::from_str::<Role>("\"LEASING_AGENT\"").unwrap(),
            Role::LeasingAgent
        );
    }

    #[test]
    fn owner_outranks_everyone() {
        for role in Role::ALL {
            assert_eq!(Role::Owner.max_privilege(role), Role::Owner);
            assert_eq!(role.max_privilege(Role::Owner), Role::Owner);
        }
    }

    #[test]
    fn delegation_is_capped_at_own_rank() {
        assert!(Role::PropertyManager.can_delegate(Role::Viewer));
        assert!(Role::PropertyManager.can_delegate(Role::PropertyManager));
        assert!(!Role::PropertyManager.can_delegate(Role::Owner));
    }
}
