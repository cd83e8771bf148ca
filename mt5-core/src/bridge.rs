use crate::deploy::DeploymentController;
use crate::error::{Error, Result};
use crate::model::{AccountSnapshot, ConnectionState, HistoryQuery, HistoryRecord, TradingAccount};
use crate::readiness::{ReadinessWaiter, WARM_READY_TIMEOUT};
use crate::remote::RemoteAccountService;
use log::info;
use std::sync::Arc;

/// Retrieves account snapshots and trade history through a ready account's
/// RPC handle.
///
/// Nothing is cached: every call re-fetches the account and re-acquires a
/// fresh connection handle.
pub struct InformationBridge {
    remote: Arc<dyn RemoteAccountService>,
    controller: Arc<DeploymentController>,
    waiter: Arc<ReadinessWaiter>,
}

impl InformationBridge {
    pub fn new(
        remote: Arc<dyn RemoteAccountService>,
        controller: Arc<DeploymentController>,
        waiter: Arc<ReadinessWaiter>,
    ) -> Self {
        Self {
            remote,
            controller,
            waiter,
        }
    }

    pub async fn snapshot(&self, account_id: &str) -> Result<AccountSnapshot> {
        let account = self.ready_account(account_id).await?;
        let handle = self
            .remote
            .connection(&account.id)
            .await
            .map_err(|e| Error::remote("connection acquisition", e))?;
        handle
            .account_information()
            .await
            .map_err(|e| Error::remote("account information fetch", e))
    }

    pub async fn history(
        &self,
        account_id: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRecord>> {
        let account = self.ready_account(account_id).await?;
        let resolved = query.resolve();
        let handle = self
            .remote
            .connection(&account.id)
            .await
            .map_err(|e| Error::remote("connection acquisition", e))?;
        handle
            .deal_history(resolved.start_time, resolved.end_time, resolved.limit)
            .await
            .map_err(|e| Error::remote("history fetch", e))
    }

    /// Fetches the account and, when it is not connected, runs exactly one
    /// remediation pass (deploy + warm wait). Never recursive: a second
    /// disconnect surfaces as a failure from the query itself.
    async fn ready_account(&self, account_id: &str) -> Result<TradingAccount> {
        let mut account = self
            .remote
            .get_account(account_id)
            .await
            .map_err(|e| Error::remote("account fetch", e))?;

        if account.connection_state != ConnectionState::Connected {
            info!(
                "account {} observed {:?}, running one remediation pass",
                account.id, account.connection_state
            );
            self.controller.ensure_deployed(&mut account).await?;
            self.waiter
                .wait_connected(&account.id, WARM_READY_TIMEOUT)
                .await?;
        }
        Ok(account)
    }
}
