use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Restaurant,
    Livreur,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Restaurant => "restaurant",
            Role::Livreur => "livreur",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "restaurant" => Ok(Role::Restaurant),
            "livreur" => Ok(Role::Livreur),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated user on whose behalf a service call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, role: Role) -> Result<(), DomainError> {
        if self.role == role {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!("{role} role required")))
        }
    }
}

/// Minimal view of a user account, used for courier lookups.
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_wire_names() {
        assert_eq!("livreur".parse::<Role>().unwrap(), Role::Livreur);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("courier".parse::<Role>().is_err());
    }

    #[test]
    fn require_role_rejects_other_roles() {
        let actor = Actor::new(Uuid::new_v4(), Role::Client);
        assert!(actor.require_role(Role::Client).is_ok());
        assert!(matches!(
            actor.require_role(Role::Restaurant),
            Err(DomainError::Forbidden(_))
        ));
    }
}
