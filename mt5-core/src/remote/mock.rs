//! Scripted remote service for tests.
//!
//! Counts every call per method and lets tests control how many state polls
//! an account needs after deployment before it reports Connected.

use super::{ConnectionHandle, NewAccount, RemoteAccountService, RemoteError};
use crate::model::{AccountSnapshot, ConnectionState, DeploymentState, HistoryRecord, TradingAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Calls {
    list: AtomicUsize,
    create: AtomicUsize,
    get: AtomicUsize,
    deploy: AtomicUsize,
    undeploy: AtomicUsize,
    connection: AtomicUsize,
}

struct State {
    accounts: HashMap<String, TradingAccount>,
    /// Remaining get_account polls before a deployed account connects.
    /// `None` means the account never connects.
    polls_remaining: HashMap<String, Option<u32>>,
    /// Plan applied to an account when it gets deployed.
    polls_after_deploy: Option<u32>,
    next_id: u32,
    fail_list: bool,
    fail_create: bool,
    fail_deploy: bool,
    fail_undeploy: bool,
    snapshot: AccountSnapshot,
    history: Vec<HistoryRecord>,
    last_history_window: Option<(DateTime<Utc>, DateTime<Utc>, usize)>,
}

struct Shared {
    state: Mutex<State>,
    calls: Calls,
}

#[derive(Clone)]
pub struct MockRemoteService {
    shared: Arc<Shared>,
}

fn api_error(message: &str) -> RemoteError {
    RemoteError::Api {
        status: 500,
        message: message.to_string(),
    }
}

impl Default for MockRemoteService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteService {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    accounts: HashMap::new(),
                    polls_remaining: HashMap::new(),
                    polls_after_deploy: Some(0),
                    next_id: 1,
                    fail_list: false,
                    fail_create: false,
                    fail_deploy: false,
                    fail_undeploy: false,
                    snapshot: AccountSnapshot {
                        balance: 10_000.0,
                        equity: 10_050.0,
                        currency: "USD".to_string(),
                        leverage: 100,
                        margin: 120.0,
                        free_margin: 9_930.0,
                        margin_level: 8_375.0,
                    },
                    history: Vec::new(),
                    last_history_window: None,
                }),
                calls: Calls::default(),
            }),
        }
    }

    /// Seeds an undeployed, disconnected account and returns its id.
    pub fn add_account(&self, server: &str, login: &str) -> String {
        self.insert(server, login, DeploymentState::Undeployed, ConnectionState::Disconnected)
    }

    /// Seeds an account that is already deployed and connected.
    pub fn add_connected_account(&self, server: &str, login: &str) -> String {
        self.insert(server, login, DeploymentState::Deployed, ConnectionState::Connected)
    }

    /// Seeds an account that is deployed but currently disconnected.
    pub fn add_disconnected_account(&self, server: &str, login: &str) -> String {
        self.insert(server, login, DeploymentState::Deployed, ConnectionState::Disconnected)
    }

    fn insert(
        &self,
        server: &str,
        login: &str,
        deployment_state: DeploymentState,
        connection_state: ConnectionState,
    ) -> String {
        let mut state = self.shared.state.lock().unwrap();
        let id = format!("acct-{}", state.next_id);
        state.next_id += 1;
        state.accounts.insert(
            id.clone(),
            TradingAccount {
                id: id.clone(),
                name: format!("{}-{}", server, login),
                server: server.to_string(),
                login: login.to_string(),
                deployment_state,
                connection_state,
            },
        );
        id
    }

    /// How many get_account polls a freshly deployed account takes to
    /// connect. `None` means it never connects.
    pub fn set_polls_until_connected(&self, polls: Option<u32>) {
        self.shared.state.lock().unwrap().polls_after_deploy = polls;
    }

    /// Forces a specific account to need `polls` further polls, or to stay
    /// disconnected forever when `None`.
    pub fn set_account_polls(&self, account_id: &str, polls: Option<u32>) {
        self.shared
            .state
            .lock()
            .unwrap()
            .polls_remaining
            .insert(account_id.to_string(), polls);
    }

    pub fn set_snapshot(&self, snapshot: AccountSnapshot) {
        self.shared.state.lock().unwrap().snapshot = snapshot;
    }

    pub fn set_history(&self, history: Vec<HistoryRecord>) {
        self.shared.state.lock().unwrap().history = history;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.shared.state.lock().unwrap().fail_list = fail;
    }

    pub fn fail_creation(&self, fail: bool) {
        self.shared.state.lock().unwrap().fail_create = fail;
    }

    pub fn fail_deploys(&self, fail: bool) {
        self.shared.state.lock().unwrap().fail_deploy = fail;
    }

    pub fn fail_undeploys(&self, fail: bool) {
        self.shared.state.lock().unwrap().fail_undeploy = fail;
    }

    pub fn list_calls(&self) -> usize {
        self.shared.calls.list.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.shared.calls.create.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.shared.calls.get.load(Ordering::SeqCst)
    }

    pub fn deploy_calls(&self) -> usize {
        self.shared.calls.deploy.load(Ordering::SeqCst)
    }

    pub fn undeploy_calls(&self) -> usize {
        self.shared.calls.undeploy.load(Ordering::SeqCst)
    }

    pub fn connection_calls(&self) -> usize {
        self.shared.calls.connection.load(Ordering::SeqCst)
    }

    pub fn connection_state(&self, account_id: &str) -> Option<ConnectionState> {
        self.shared
            .state
            .lock()
            .unwrap()
            .accounts
            .get(account_id)
            .map(|a| a.connection_state)
    }

    /// The (start, end, limit) window of the most recent history query.
    pub fn last_history_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>, usize)> {
        self.shared.state.lock().unwrap().last_history_window
    }
}

#[async_trait]
impl RemoteAccountService for MockRemoteService {
    async fn list_accounts(&self) -> Result<Vec<TradingAccount>, RemoteError> {
        self.shared.calls.list.fetch_add(1, Ordering::SeqCst);
        let state = self.shared.state.lock().unwrap();
        if state.fail_list {
            return Err(api_error("listing unavailable"));
        }
        Ok(state.accounts.values().cloned().collect())
    }

    async fn create_account(&self, request: NewAccount) -> Result<TradingAccount, RemoteError> {
        self.shared.calls.create.fetch_add(1, Ordering::SeqCst);
        if self.shared.state.lock().unwrap().fail_create {
            return Err(api_error("creation rejected"));
        }
        let id = self.insert(
            &request.server,
            &request.login,
            DeploymentState::Undeployed,
            ConnectionState::Disconnected,
        );
        let state = self.shared.state.lock().unwrap();
        Ok(state.accounts[&id].clone())
    }

    async fn get_account(&self, account_id: &str) -> Result<TradingAccount, RemoteError> {
        self.shared.calls.get.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.state.lock().unwrap();
        if !state.accounts.contains_key(account_id) {
            return Err(RemoteError::NotFound(account_id.to_string()));
        }

        // Advance the scripted connection plan for deployed accounts.
        let plan = state.polls_remaining.get(account_id).copied();
        if let Some(plan) = plan {
            let next_state = match plan {
                Some(0) => {
                    state.polls_remaining.remove(account_id);
                    Some(ConnectionState::Connected)
                }
                Some(n) => {
                    state
                        .polls_remaining
                        .insert(account_id.to_string(), Some(n - 1));
                    Some(ConnectionState::Connecting)
                }
                None => None,
            };
            if let Some(next_state) = next_state {
                if let Some(account) = state.accounts.get_mut(account_id) {
                    if account.deployment_state == DeploymentState::Deployed
                        && account.connection_state != ConnectionState::Connected
                    {
                        account.connection_state = next_state;
                    }
                }
            }
        }

        Ok(state.accounts[account_id].clone())
    }

    async fn deploy(&self, account_id: &str) -> Result<(), RemoteError> {
        self.shared.calls.deploy.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.state.lock().unwrap();
        if state.fail_deploy {
            return Err(api_error("deploy rejected"));
        }
        let plan = state.polls_after_deploy;
        match state.accounts.get_mut(account_id) {
            Some(account) => {
                account.deployment_state = DeploymentState::Deployed;
                if account.connection_state != ConnectionState::Connected {
                    account.connection_state = ConnectionState::Connecting;
                }
                state
                    .polls_remaining
                    .insert(account_id.to_string(), plan);
                Ok(())
            }
            None => Err(RemoteError::NotFound(account_id.to_string())),
        }
    }

    async fn undeploy(&self, account_id: &str) -> Result<(), RemoteError> {
        self.shared.calls.undeploy.fetch_add(1, Ordering::SeqCst);
        let mut state = self.shared.state.lock().unwrap();
        if state.fail_undeploy {
            return Err(api_error("undeploy rejected"));
        }
        match state.accounts.get_mut(account_id) {
            Some(account) => {
                account.deployment_state = DeploymentState::Undeployed;
                account.connection_state = ConnectionState::Disconnected;
                Ok(())
            }
            None => Err(RemoteError::NotFound(account_id.to_string())),
        }
    }

    async fn connection(&self, account_id: &str) -> Result<Box<dyn ConnectionHandle>, RemoteError> {
        self.shared.calls.connection.fetch_add(1, Ordering::SeqCst);
        if !self
            .shared
            .state
            .lock()
            .unwrap()
            .accounts
            .contains_key(account_id)
        {
            return Err(RemoteError::NotFound(account_id.to_string()));
        }
        Ok(Box::new(MockConnectionHandle {
            shared: self.shared.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        if self.shared.state.lock().unwrap().fail_list {
            return Err(api_error("unreachable"));
        }
        Ok(())
    }
}

struct MockConnectionHandle {
    shared: Arc<Shared>,
}

#[async_trait]
impl ConnectionHandle for MockConnectionHandle {
    async fn account_information(&self) -> Result<AccountSnapshot, RemoteError> {
        Ok(self.shared.state.lock().unwrap().snapshot.clone())
    }

    async fn deal_history(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RemoteError> {
        let mut state = self.shared.state.lock().unwrap();
        state.last_history_window = Some((start_time, end_time, limit));
        Ok(state.history.clone())
    }
}
