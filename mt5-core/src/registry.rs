use crate::error::{Error, Result};
use crate::model::{account_key, TradingAccount};
use crate::remote::{NewAccount, RemoteAccountService};
use crate::sync::KeyedLock;
use log::{info, warn};
use std::sync::Arc;

/// Result of resolving a (server, login) pair to an account.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub account: TradingAccount,
    /// Whether this call created the account, as opposed to reusing an
    /// existing one. Drives the cold/warm readiness timeout choice.
    pub created: bool,
}

/// Resolves a (server, login) pair to a unique remote account, creating one
/// if absent.
pub struct AccountRegistry {
    remote: Arc<dyn RemoteAccountService>,
    locks: Arc<KeyedLock>,
}

impl AccountRegistry {
    pub fn new(remote: Arc<dyn RemoteAccountService>, locks: Arc<KeyedLock>) -> Self {
        Self { remote, locks }
    }

    /// Finds the account matching `login` exactly and `server`
    /// case-insensitively, or creates a cloud MT5 account when none exists.
    ///
    /// Serialized per normalized key, so concurrent flows for the same pair
    /// issue at most one creation call. The password is NOT re-verified when
    /// an existing account matches; this mirrors the remote platform's own
    /// provisioning semantics and is a deliberate policy choice.
    pub async fn find_or_create(
        &self,
        server: &str,
        login: &str,
        password: &str,
    ) -> Result<Provisioned> {
        if server.trim().is_empty() {
            return Err(Error::Validation("server must not be empty".to_string()));
        }
        if login.trim().is_empty() {
            return Err(Error::Validation("login must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::Validation("password must not be empty".to_string()));
        }

        let key = account_key(server, login);
        let _guard = self.locks.acquire(&key).await;

        // A failed listing must not block provisioning; treat it as "no
        // match" and fall through to creation.
        let existing = match self.remote.list_accounts().await {
            Ok(accounts) => accounts
                .into_iter()
                .find(|a| a.login == login && a.server.eq_ignore_ascii_case(server)),
            Err(e) => {
                warn!("account listing failed for {}, proceeding to create: {}", key, e);
                None
            }
        };

        if let Some(account) = existing {
            info!("reusing account {} for {}", account.id, key);
            return Ok(Provisioned {
                account,
                created: false,
            });
        }

        let account = self
            .remote
            .create_account(NewAccount::cloud(server, login, password))
            .await
            .map_err(|e| Error::remote("account creation", e))?;
        info!("created account {} for {}", account.id, key);
        Ok(Provisioned {
            account,
            created: true,
        })
    }
}
