use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

/// How long a freshly provisioned credential can be collected.
pub const FLASH_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedAccount {
    pub first_name: String,
    pub login_name: String,
    pub password: String,
}

struct Flash {
    account: ProvisionedAccount,
    expires_at: Instant,
}

/// Single-read values keyed by invite id. Reading removes the entry.
pub struct FlashStore {
    entries: DashMap<String, Flash>,
    ttl: Duration,
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::new(FLASH_TTL)
    }
}

impl FlashStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn put(&self, invite_id: &str, account: ProvisionedAccount) {
        self.entries.insert(
            invite_id.to_string(),
            Flash {
                account,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn take(&self, invite_id: &str) -> Option<ProvisionedAccount> {
        let (_, flash) = self.entries.remove(invite_id)?;
        (flash.expires_at > Instant::now()).then_some(flash.account)
    }

    /// Drops expired entries and returns how many went.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, flash| flash.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
