use crate::bridge::InformationBridge;
use crate::deploy::DeploymentController;
use crate::error::{Error, Result};
use crate::model::{AccountSnapshot, HistoryQuery, HistoryRecord};
use crate::readiness::{ReadinessWaiter, COLD_CONNECT_TIMEOUT, WARM_READY_TIMEOUT};
use crate::registry::{AccountRegistry, Provisioned};
use crate::remote::RemoteAccountService;
use crate::sync::KeyedLock;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Result of a successful connect flow.
#[derive(Debug, Clone)]
pub struct ConnectOutcome {
    pub account_id: String,
    pub snapshot: AccountSnapshot,
}

/// Wires registry, controller, waiter and bridge over one shared remote
/// client. Each public method is one logical flow: stages run strictly in
/// sequence and short-circuit on the first failure.
pub struct BridgeService {
    remote: Arc<dyn RemoteAccountService>,
    registry: AccountRegistry,
    controller: Arc<DeploymentController>,
    waiter: Arc<ReadinessWaiter>,
    bridge: InformationBridge,
}

impl BridgeService {
    pub fn new(remote: Arc<dyn RemoteAccountService>) -> Self {
        Self::build(remote, None)
    }

    /// Overrides the readiness poll interval; used by tests to keep waits
    /// short.
    pub fn with_poll_interval(remote: Arc<dyn RemoteAccountService>, poll_interval: Duration) -> Self {
        Self::build(remote, Some(poll_interval))
    }

    fn build(remote: Arc<dyn RemoteAccountService>, poll_interval: Option<Duration>) -> Self {
        let locks = Arc::new(KeyedLock::new());
        let controller = Arc::new(DeploymentController::new(remote.clone(), locks.clone()));
        let waiter = Arc::new(match poll_interval {
            Some(interval) => ReadinessWaiter::with_poll_interval(remote.clone(), interval),
            None => ReadinessWaiter::new(remote.clone()),
        });
        let bridge = InformationBridge::new(remote.clone(), controller.clone(), waiter.clone());
        Self {
            registry: AccountRegistry::new(remote.clone(), locks),
            remote,
            controller,
            waiter,
            bridge,
        }
    }

    /// Provisions (or reuses) the account for (server, login), deploys it,
    /// waits for readiness and returns a fresh snapshot.
    ///
    /// A freshly created account gets the cold 60s connect bound; a reused
    /// one gets the warm 30s bound.
    pub async fn connect(
        &self,
        server: &str,
        login: &str,
        password: &str,
    ) -> Result<ConnectOutcome> {
        let Provisioned {
            mut account,
            created,
        } = self.registry.find_or_create(server, login, password).await?;

        self.controller.ensure_deployed(&mut account).await?;

        let timeout = if created {
            COLD_CONNECT_TIMEOUT
        } else {
            WARM_READY_TIMEOUT
        };
        self.waiter.wait_connected(&account.id, timeout).await?;

        let snapshot = self.bridge.snapshot(&account.id).await?;
        info!("connect flow completed for account {}", account.id);
        Ok(ConnectOutcome {
            account_id: account.id,
            snapshot,
        })
    }

    pub async fn account_info(&self, account_id: &str) -> Result<AccountSnapshot> {
        self.bridge.snapshot(account_id).await
    }

    pub async fn history(
        &self,
        account_id: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRecord>> {
        self.bridge.history(account_id, query).await
    }

    /// Undeploys the account's live connection. The account itself is never
    /// deleted; a later connect can reuse it.
    pub async fn disconnect(&self, account_id: &str) -> Result<()> {
        let account = self
            .remote
            .get_account(account_id)
            .await
            .map_err(|e| Error::remote("account fetch", e))?;
        self.controller.undeploy(&account).await?;
        info!("disconnect flow completed for account {}", account.id);
        Ok(())
    }

    /// Remote connectivity check for the process health probe.
    pub async fn remote_reachable(&self) -> bool {
        self.remote.ping().await.is_ok()
    }
}
