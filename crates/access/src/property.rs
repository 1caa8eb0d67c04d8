use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentgate_core::{PropertyId, UserId};

/// Protected property.
///
/// Only `landlord_id` and `disabled_at` feed access evaluation; the remaining
/// fields belong to the property-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub property_id: PropertyId,
    pub landlord_id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub disabled_at: Option<DateTime<Utc>>,
}

impl Property {
    pub fn new(landlord_id: UserId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            property_id: PropertyId::new(),
            landlord_id,
            name: name.into(),
            created_at,
            disabled_at: None,
        }
    }

    /// Soft-deleted properties are excluded from every evaluation.
    pub fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }
}
