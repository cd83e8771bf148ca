use crate::error::{Error, Result};
use crate::model::ConnectionState;
use crate::remote::{RemoteAccountService, RemoteError};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Bound for the first connect after provisioning a new account.
pub const COLD_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound for ready-checks on an already-provisioned account.
pub const WARM_READY_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Blocks a flow until an account is connected or a timeout elapses.
///
/// This is the only component allowed to wait for a bounded duration; it
/// never blocks past the caller's timeout, whatever the remote does.
pub struct ReadinessWaiter {
    remote: Arc<dyn RemoteAccountService>,
    poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(remote: Arc<dyn RemoteAccountService>) -> Self {
        Self::with_poll_interval(remote, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(remote: Arc<dyn RemoteAccountService>, poll_interval: Duration) -> Self {
        Self {
            remote,
            poll_interval,
        }
    }

    /// Polls the account's connection state until Connected is observed at
    /// least once, or `timeout` elapses.
    ///
    /// Success does not guarantee the state stays Connected after return;
    /// the next RPC call is authoritative. Transient poll failures are
    /// logged and retried within the same bound.
    pub async fn wait_connected(&self, account_id: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut last_state = ConnectionState::Disconnected;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            // Each poll is clamped to the deadline so a hung remote call
            // cannot extend the wait.
            match tokio::time::timeout(remaining, self.remote.get_account(account_id)).await {
                Ok(Ok(account)) => {
                    last_state = account.connection_state;
                    if account.connection_state == ConnectionState::Connected {
                        info!("account {} is connected", account_id);
                        return Ok(());
                    }
                }
                Ok(Err(RemoteError::NotFound(id))) => return Err(Error::NotFound(id)),
                Ok(Err(e)) => {
                    warn!("state poll failed for {}: {}", account_id, e);
                }
                Err(_) => break,
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }

        Err(Error::ConnectionTimeout {
            account_id: account_id.to_string(),
            waited: timeout,
            last_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::mock::MockRemoteService;
    use std::time::Instant;

    fn waiter(remote: &MockRemoteService) -> ReadinessWaiter {
        ReadinessWaiter::with_poll_interval(Arc::new(remote.clone()), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn returns_once_connected_is_observed() {
        let remote = MockRemoteService::new();
        let id = remote.add_disconnected_account("Acme-Live", "1001");
        remote.set_account_polls(&id, Some(2));

        waiter(&remote)
            .wait_connected(&id, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(
            remote.connection_state(&id),
            Some(ConnectionState::Connected)
        );
    }

    #[tokio::test]
    async fn never_blocks_past_the_timeout() {
        let remote = MockRemoteService::new();
        let id = remote.add_disconnected_account("Acme-Live", "1001");
        // Never connects.
        remote.set_account_polls(&id, None);

        let bound = Duration::from_millis(50);
        let started = Instant::now();
        let err = waiter(&remote).wait_connected(&id, bound).await.unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
        assert!(
            elapsed < bound + Duration::from_millis(200),
            "wait overran its bound: {:?}",
            elapsed
        );
        match err {
            Error::ConnectionTimeout {
                waited, last_state, ..
            } => {
                assert_eq!(waited, bound);
                assert_eq!(last_state, ConnectionState::Disconnected);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeout_reports_the_last_observed_state() {
        let remote = MockRemoteService::new();
        let id = remote.add_disconnected_account("Acme-Live", "1001");
        // Stays in Connecting far longer than the bound allows.
        remote.set_account_polls(&id, Some(1_000_000));

        let err = waiter(&remote)
            .wait_connected(&id, Duration::from_millis(50))
            .await
            .unwrap_err();

        match err {
            Error::ConnectionTimeout { last_state, .. } => {
                assert_eq!(last_state, ConnectionState::Connecting);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_account_fails_fast() {
        let remote = MockRemoteService::new();
        let err = waiter(&remote)
            .wait_connected("acct-missing", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
