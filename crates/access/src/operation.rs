use core::str::FromStr;

use serde::{Deserialize, Serialize};

use rentgate_core::DomainError;

/// Property-scoped operation a role may authorize.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    ViewProperty,
    EditProperty,
    DeleteProperty,
    ManageUnits,
    ManageTenants,
    ManageUsers,
    ViewFinancials,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::ViewProperty,
        Operation::EditProperty,
        Operation::DeleteProperty,
        Operation::ManageUnits,
        Operation::ManageTenants,
        Operation::ManageUsers,
        Operation::ViewFinancials,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ViewProperty => "VIEW_PROPERTY",
            Operation::EditProperty => "EDIT_PROPERTY",
            Operation::DeleteProperty => "DELETE_PROPERTY",
            Operation::ManageUnits => "MANAGE_UNITS",
            Operation::ManageTenants => "MANAGE_TENANTS",
            Operation::ManageUsers => "MANAGE_USERS",
            Operation::ViewFinancials => "VIEW_FINANCIALS",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| DomainError::UnknownOperation(s.to_string()))
    }
}

/// Immutable set of operations (bitset over [`Operation`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct OperationSet(u8);

impl OperationSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::of(&Operation::ALL)
    }

    pub fn of(ops: &[Operation]) -> Self {
        Self(ops.iter().fold(0, |acc, op| acc | op.bit()))
    }

    pub fn contains(&self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        Operation::ALL.into_iter().filter(|op| self.contains(*op))
    }
}

impl Serialize for OperationSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_membership() {
        let set = OperationSet::of(&[Operation::ViewProperty, Operation::ManageTenants]);
        assert!(set.contains(Operation::ViewProperty));
        assert!(set.contains(Operation::ManageTenants));
        assert!(!set.contains(Operation::DeleteProperty));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn all_covers_every_operation() {
        let all = OperationSet::all();
        assert_eq!(all.len(), Operation::ALL.len());
        assert!(Operation::ALL.iter().all(|op| all.contains(*op)));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!("manage_users".parse::<Operation>().unwrap(), Operation::ManageUsers);
        assert!(matches!(
            "launch_missiles".parse::<Operation>(),
            Err(DomainError::UnknownOperation(_))
        ));
    }

    #[test]
    fn serializes_as_list_of_codes() {
        let set = OperationSet::of(&[Operation::ViewProperty]);
        assert_eq!(serde_json::to_string(&set).unwrap(), "[\"VIEW_PROPERTY\"]");
    }
}
