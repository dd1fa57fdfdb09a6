//! Acting principals as seen by the reservation manager.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a principal owned by the identity provider.
pub type PrincipalId = Uuid;

/// Authorization role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    /// May modify or cancel reservations it does not own.
    Admin,
}

impl Role {
    /// Stable storage/CLI spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Parses the storage spelling. Matching is exact.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Authenticated principal passed explicitly into every manager operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub display_name: String,
    pub role: Role,
}

impl Principal {
    pub fn new(display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns whether this principal may mutate a record owned by `owner_id`.
    pub fn can_manage(&self, owner_id: PrincipalId) -> bool {
        self.id == owner_id || self.is_admin()
    }
}
