//! Authenticated user identity, as exposed by the auth provider.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Member,
    Trainer,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub role: UserRole,
}

impl UserIdentity {
    pub fn member(id: impl Into<String>) -> Self {
        UserIdentity {
            id: id.into(),
            role: UserRole::Member,
        }
    }
}
