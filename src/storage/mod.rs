//!
//! freelancekz session storage
//! ---------------------------
//! Two key/value scopes back the client session:
//! - durable: survives restarts (a JSON file under the state directory),
//! - volatile: lives as long as one browsing session (process memory).
//!
//! The store is deliberately dumb: no encryption and no expiry tracking. The only
//! policy it carries is the boot-time `sanitize` pass, which drops single-use
//! verification keys and any durable role/token left behind without a user id.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;

mod durable;
mod volatile;

pub use durable::FileStore;
pub use volatile::MemoryStore;

/// Key names shared by every component that touches session storage.
pub mod keys {
    // durable
    pub const USER_ID: &str = "user_id";
    pub const USER_ROLE: &str = "user_role";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const IS_EGOV_AUTH: &str = "is_egov_auth";
    pub const LOCALE: &str = "locale";
    pub const THEME: &str = "theme";

    // volatile
    pub const EGOV_ACCESS_TOKEN: &str = "egov_access_token";
    pub const EGOV_ID_TOKEN: &str = "egov_id_token";
    pub const EGOV_REFRESH_TOKEN: &str = "egov_refresh_token";
    pub const EGOV_USER: &str = "egov_user";
    pub const EGOV_AUTH_CODE: &str = "egov_auth_code";
    pub const EGOV_FLOW: &str = "egov_flow";

    /// Durable keys that describe the signed-in identity. Cleared together.
    pub const DURABLE_AUTH: [&str; 4] = [USER_ID, USER_ROLE, ACCESS_TOKEN, IS_EGOV_AUTH];

    /// Durable keys that must not outlive a missing user id.
    pub const DURABLE_DEPENDENT: [&str; 3] = [USER_ROLE, ACCESS_TOKEN, IS_EGOV_AUTH];

    /// Every volatile identity-verification key.
    pub const VOLATILE_EGOV: [&str; 6] =
        [EGOV_ACCESS_TOKEN, EGOV_ID_TOKEN, EGOV_REFRESH_TOKEN, EGOV_USER, EGOV_AUTH_CODE, EGOV_FLOW];
}

/// Minimal key/value contract implemented by both storage scopes.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;

    /// Remove several keys; stops at the first failure.
    fn remove_all(&self, keys: &[&str]) -> AppResult<()> {
        for k in keys {
            self.remove(k)?;
        }
        Ok(())
    }
}

/// Handle over the durable and volatile scopes. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    durable: Arc<dyn KeyValueStore>,
    volatile: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(durable: Arc<dyn KeyValueStore>, volatile: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, volatile }
    }

    /// Durable scope in `<state_dir>/session.json`, volatile scope in memory.
    pub fn open<P: AsRef<Path>>(state_dir: P) -> AppResult<Self> {
        let durable = FileStore::open(state_dir.as_ref().join("session.json"))?;
        Ok(Self::new(Arc::new(durable), Arc::new(MemoryStore::new())))
    }

    /// Both scopes in memory; used by tests and throwaway sessions.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn durable(&self) -> &dyn KeyValueStore { self.durable.as_ref() }
    pub fn volatile(&self) -> &dyn KeyValueStore { self.volatile.as_ref() }

    /// Boot-time cleanup. Run once, before the auth session is constructed.
    ///
    /// Volatile verification keys are always dropped. Durable role, token and
    /// verification flag are dropped only when no durable user id exists, so a
    /// legitimate persisted session survives the restart.
    pub fn sanitize(&self) -> AppResult<()> {
        self.volatile.remove_all(&keys::VOLATILE_EGOV)?;
        let has_user = self.durable.read(keys::USER_ID).is_some();
        if !has_user {
            self.durable.remove_all(&keys::DURABLE_DEPENDENT)?;
        }
        debug!(target: "storage", has_user, "session storage sanitized");
        Ok(())
    }

    /// Drop every durable auth key and every volatile verification key.
    pub fn clear_auth(&self) -> AppResult<()> {
        self.durable.remove_all(&keys::DURABLE_AUTH)?;
        self.volatile.remove_all(&keys::VOLATILE_EGOV)
    }
}
