//! The authenticated user as seen by the messaging layer.

use serde::{Deserialize, Serialize};

/// Read-only view of the current user: a logical id and a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    logical_id: String,
    full_name: String,
}

impl User {
    pub fn new(logical_id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            full_name: full_name.into(),
        }
    }

    pub fn get_logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn get_full_name(&self) -> &str {
        &self.full_name
    }
}
