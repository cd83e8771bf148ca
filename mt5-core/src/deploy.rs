use crate::error::{Error, Result};
use crate::model::{DeploymentState, TradingAccount};
use crate::remote::RemoteAccountService;
use crate::sync::KeyedLock;
use log::{debug, info};
use std::sync::Arc;

/// Drives an account through deploy/undeploy transitions idempotently.
pub struct DeploymentController {
    remote: Arc<dyn RemoteAccountService>,
    locks: Arc<KeyedLock>,
}

impl DeploymentController {
    pub fn new(remote: Arc<dyn RemoteAccountService>, locks: Arc<KeyedLock>) -> Self {
        Self { remote, locks }
    }

    /// Deploys the account unless it is already deployed. The local state
    /// update is optimistic; the remote service remains authoritative on
    /// subsequent reads.
    pub async fn ensure_deployed(&self, account: &mut TradingAccount) -> Result<()> {
        let _guard = self.locks.acquire(&account.key()).await;

        if account.deployment_state == DeploymentState::Deployed {
            debug!("account {} already deployed", account.id);
            return Ok(());
        }

        self.remote
            .deploy(&account.id)
            .await
            .map_err(|e| Error::remote("deploy", e))?;
        account.deployment_state = DeploymentState::Deployed;
        info!("deployed account {}", account.id);
        Ok(())
    }

    /// Undeploys unconditionally, without checking the local deployment
    /// state first: undeploying an already-undeployed account is itself an
    /// operation against the remote service and any rejection is surfaced.
    pub async fn undeploy(&self, account: &TradingAccount) -> Result<()> {
        self.remote
            .undeploy(&account.id)
            .await
            .map_err(|e| Error::remote("undeploy", e))?;
        info!("undeployed account {}", account.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::mock::MockRemoteService;

    fn controller(remote: &MockRemoteService) -> DeploymentController {
        DeploymentController::new(Arc::new(remote.clone()), Arc::new(KeyedLock::new()))
    }

    async fn fetch(remote: &MockRemoteService, id: &str) -> TradingAccount {
        remote.get_account(id).await.unwrap()
    }

    #[tokio::test]
    async fn ensure_deployed_is_idempotent() {
        let remote = MockRemoteService::new();
        let id = remote.add_account("Acme-Live", "1001");
        let controller = controller(&remote);
        let mut account = fetch(&remote, &id).await;

        controller.ensure_deployed(&mut account).await.unwrap();
        controller.ensure_deployed(&mut account).await.unwrap();

        assert_eq!(remote.deploy_calls(), 1, "second call must be a no-op");
        assert_eq!(account.deployment_state, DeploymentState::Deployed);
    }

    #[tokio::test]
    async fn already_deployed_account_issues_no_call() {
        let remote = MockRemoteService::new();
        let id = remote.add_connected_account("Acme-Live", "1001");
        let controller = controller(&remote);
        let mut account = fetch(&remote, &id).await;

        controller.ensure_deployed(&mut account).await.unwrap();

        assert_eq!(remote.deploy_calls(), 0);
    }

    #[tokio::test]
    async fn deploy_failure_is_fatal() {
        let remote = MockRemoteService::new();
        let id = remote.add_account("Acme-Live", "1001");
        remote.fail_deploys(true);
        let controller = controller(&remote);
        let mut account = fetch(&remote, &id).await;

        let err = controller.ensure_deployed(&mut account).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteService);
        assert_eq!(account.deployment_state, DeploymentState::Undeployed);
    }

    #[tokio::test]
    async fn undeploy_does_not_check_state_first() {
        let remote = MockRemoteService::new();
        let id = remote.add_account("Acme-Live", "1001");
        let controller = controller(&remote);
        let account = fetch(&remote, &id).await;

        // Account was never deployed; the call still goes out.
        controller.undeploy(&account).await.unwrap();
        assert_eq!(remote.undeploy_calls(), 1);
    }

    #[tokio::test]
    async fn undeploy_rejection_is_surfaced() {
        let remote = MockRemoteService::new();
        let id = remote.add_connected_account("Acme-Live", "1001");
        remote.fail_undeploys(true);
        let controller = controller(&remote);
        let account = fetch(&remote, &id).await;

        let err = controller.undeploy(&account).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteService);
    }
}
