//! Named projects.
//!
//! Projects have their own lifecycle and no invariant tying them to
//! markets; a market may carry a project id as free-form metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ProjectId, UserId};

/// A registered project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub owner: UserId,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// New project stamped with the current time.
    pub fn new(
        id: ProjectId,
        name: impl Into<String>,
        description: impl Into<String>,
        owner: impl Into<UserId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            owner: owner.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}
