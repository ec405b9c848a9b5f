use crate::error::{Result, TermError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Parent,
}

/// Caller context carried on every mutating request. Nothing about the caller is kept
/// in process-wide state between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub actor_id: String,
    pub role: Role,
}

impl Session {
    pub fn require_admin(&self) -> Result<()> {
        if self.role == Role::Admin {
            return Ok(());
        }
        Err(TermError::Forbidden(format!(
            "actor {} is not an administrator",
            self.actor_id
        )))
    }

    /// Admins and teachers; parents are read-only.
    pub fn require_staff(&self) -> Result<()> {
        match self.role {
            Role::Admin | Role::Teacher => Ok(()),
            Role::Parent => Err(TermError::Forbidden(format!(
                "actor {} cannot record term activity",
                self.actor_id
            ))),
        }
    }
}
