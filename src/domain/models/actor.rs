//! Acting identities.

use serde::{Deserialize, Serialize};

use super::verification::SYSTEM_VERIFIER;

/// Kind of identity performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Student,
    Admin,
    System,
    External,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
            Self::System => "system",
            Self::External => "external",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "student" => Some(Self::Student),
            "admin" => Some(Self::Admin),
            "system" => Some(Self::System),
            "external" => Some(Self::External),
            _ => None,
        }
    }

    /// Whether this actor may approve or reject verification requests.
    pub fn can_review(&self) -> bool {
        matches!(self, Self::Admin | Self::External)
    }
}

/// Whoever performs an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub actor_type: ActorType,
}

impl Actor {
    pub fn new(id: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            id: id.into(),
            actor_type,
        }
    }

    pub fn student(id: impl Into<String>) -> Self {
        Self::new(id, ActorType::Student)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, ActorType::Admin)
    }

    pub fn system() -> Self {
        Self::new(SYSTEM_VERIFIER, ActorType::System)
    }

    pub fn is_admin(&self) -> bool {
        self.actor_type == ActorType::Admin
    }
}
