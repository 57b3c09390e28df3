use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Marketplace role as issued by the API. Anything unrecognised, and the
/// unauthenticated visitor, is `Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Freelancer,
    Client,
    Both,
    Admin,
    #[default]
    #[serde(other)]
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Freelancer => "freelancer",
            Role::Client => "client",
            Role::Both => "both",
            Role::Admin => "admin",
            Role::Guest => "guest",
        }
    }

    /// The role used for gating: absent means guest.
    pub fn effective(role: Option<Role>) -> Role { role.unwrap_or_default() }

    /// Roles a visitor may pick when registering.
    pub fn is_selectable(&self) -> bool { matches!(self, Role::Freelancer | Role::Client | Role::Both) }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "freelancer" => Role::Freelancer,
            "client" => Role::Client,
            "both" => Role::Both,
            "admin" => Role::Admin,
            _ => Role::Guest,
        })
    }
}
