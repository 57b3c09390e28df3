use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::storage::{keys, SessionStore};

/// Attributes asserted by the identity provider.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EgovIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iin: Option<String>,
    #[serde(default, rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl EgovIdentity {
    /// IIN with all but the last four digits hidden.
    pub fn masked_iin(&self) -> Option<String> {
        self.iin.as_ref().map(|iin| {
            let n = iin.chars().count();
            let tail: String = iin.chars().skip(n.saturating_sub(4)).collect();
            format!("{}{}", "*".repeat(n.saturating_sub(4)), tail)
        })
    }
}

// keeps the IIN out of logs
impl fmt::Debug for EgovIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EgovIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("iin", &self.masked_iin())
            .field("full_name", &self.full_name)
            .finish()
    }
}

/// What the callback leaves in volatile storage for display after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    pub identity: EgovIdentity,
    pub auth_code: Option<String>,
}

impl VerificationRecord {
    pub fn save(store: &SessionStore, identity: &EgovIdentity, auth_code: &str) -> AppResult<()> {
        let vol = store.volatile();
        vol.write(keys::EGOV_USER, &serde_json::to_string(identity)?)?;
        vol.write(keys::EGOV_AUTH_CODE, auth_code)
    }

    /// `None` when nothing was stored or the stored identity is unreadable.
    pub fn load(store: &SessionStore) -> Option<Self> {
        let vol = store.volatile();
        let identity = serde_json::from_str(&vol.read(keys::EGOV_USER)?).ok()?;
        Some(Self { identity, auth_code: vol.read(keys::EGOV_AUTH_CODE) })
    }
}
