//! Bookable resources as published by the resource directory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a bookable resource.
pub type ResourceId = Uuid;

/// A meeting room. Deactivation is a soft delete via `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub location: Option<String>,
    pub capacity: u32,
    pub description: Option<String>,
    pub is_active: bool,
}

impl Resource {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            location: None,
            capacity,
            description: None,
            is_active: true,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns whether new reservations may target this resource.
    pub fn is_bookable(&self) -> bool {
        self.is_active
    }
}
