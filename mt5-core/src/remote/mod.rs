//! Contract of the remote account-management service.
//!
//! The bridge consumes this interface; it never implements the remote
//! platform's own protocol. One shared implementation instance is
//! constructed at startup and injected into every stage that needs it.

pub mod http;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use crate::model::{AccountSnapshot, HistoryRecord, TradingAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use http::HttpRemoteService;

/// Failure modes of the remote dependency, as seen by this crate.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The remote service does not recognize the account identity.
    #[error("account {0} is unknown to the remote service")]
    NotFound(String),

    /// The remote service rejected the call.
    #[error("remote api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The call never reached the remote service, or the response was
    /// unusable.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Provisioning request for a new trading account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    #[serde(rename = "type")]
    pub provisioning_type: String,
    pub platform: String,
    pub server: String,
    pub login: String,
    pub password: String,
}

impl NewAccount {
    /// A cloud-provisioned MT5 account with a display name derived from the
    /// server and login.
    pub fn cloud(server: &str, login: &str, password: &str) -> Self {
        Self {
            name: format!("{}-{}", server, login),
            provisioning_type: "cloud".to_string(),
            platform: "mt5".to_string(),
            server: server.to_string(),
            login: login.to_string(),
            password: password.to_string(),
        }
    }
}

/// The remote platform's account-management and RPC interface.
#[async_trait]
pub trait RemoteAccountService: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<TradingAccount>, RemoteError>;

    async fn create_account(&self, request: NewAccount) -> Result<TradingAccount, RemoteError>;

    async fn get_account(&self, account_id: &str) -> Result<TradingAccount, RemoteError>;

    async fn deploy(&self, account_id: &str) -> Result<(), RemoteError>;

    async fn undeploy(&self, account_id: &str) -> Result<(), RemoteError>;

    /// Acquires a fresh RPC handle for a connected account. Handles are
    /// scoped to a single logical operation and never shared across flows.
    async fn connection(&self, account_id: &str) -> Result<Box<dyn ConnectionHandle>, RemoteError>;

    /// Cheap connectivity check used by the process health probe.
    async fn ping(&self) -> Result<(), RemoteError>;
}

/// Ephemeral capability for issuing information queries against a ready
/// account. Invalid once the account disconnects.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    async fn account_information(&self) -> Result<AccountSnapshot, RemoteError>;

    async fn deal_history(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RemoteError>;
}
