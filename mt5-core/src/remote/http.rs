use super::{ConnectionHandle, NewAccount, RemoteAccountService, RemoteError};
use crate::model::{AccountSnapshot, HistoryRecord, TradingAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, Response, StatusCode};

const AUTH_HEADER: &str = "auth-token";

/// Remote account service over its provisioning REST API.
///
/// Built once at startup and shared across all request flows; reqwest's
/// client pools connections internally so cloning the service is cheap.
#[derive(Clone)]
pub struct HttpRemoteService {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpRemoteService {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn accounts_url(&self) -> String {
        format!("{}/users/current/accounts", self.base_url)
    }

    fn account_url(&self, account_id: &str) -> String {
        format!("{}/{}", self.accounts_url(), account_id)
    }
}

/// Turns a non-success response into a RemoteError, consuming the body as
/// the error message.
async fn expect_ok(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteAccountService for HttpRemoteService {
    async fn list_accounts(&self) -> Result<Vec<TradingAccount>, RemoteError> {
        let response = self
            .http
            .get(self.accounts_url())
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        let accounts = expect_ok(response).await?.json().await?;
        Ok(accounts)
    }

    async fn create_account(&self, request: NewAccount) -> Result<TradingAccount, RemoteError> {
        debug!("creating account for login {} on {}", request.login, request.server);
        let response = self
            .http
            .post(self.accounts_url())
            .header(AUTH_HEADER, &self.token)
            .json(&request)
            .send()
            .await?;
        let account = expect_ok(response).await?.json().await?;
        Ok(account)
    }

    async fn get_account(&self, account_id: &str) -> Result<TradingAccount, RemoteError> {
        let response = self
            .http
            .get(self.account_url(account_id))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(account_id.to_string()));
        }
        let account = expect_ok(response).await?.json().await?;
        Ok(account)
    }

    async fn deploy(&self, account_id: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(format!("{}/deploy", self.account_url(account_id)))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(account_id.to_string()));
        }
        expect_ok(response).await?;
        Ok(())
    }

    async fn undeploy(&self, account_id: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .post(format!("{}/undeploy", self.account_url(account_id)))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(account_id.to_string()));
        }
        expect_ok(response).await?;
        Ok(())
    }

    async fn connection(&self, account_id: &str) -> Result<Box<dyn ConnectionHandle>, RemoteError> {
        // Handles are per-operation; validity is checked by the first RPC.
        Ok(Box::new(HttpConnectionHandle {
            http: self.http.clone(),
            base_url: self.account_url(account_id),
            token: self.token.clone(),
            account_id: account_id.to_string(),
        }))
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        let response = self
            .http
            .get(self.accounts_url())
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }
}

struct HttpConnectionHandle {
    http: Client,
    base_url: String,
    token: String,
    account_id: String,
}

#[async_trait]
impl ConnectionHandle for HttpConnectionHandle {
    async fn account_information(&self) -> Result<AccountSnapshot, RemoteError> {
        let response = self
            .http
            .get(format!("{}/account-information", self.base_url))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(self.account_id.clone()));
        }
        let snapshot = expect_ok(response).await?.json().await?;
        Ok(snapshot)
    }

    async fn deal_history(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, RemoteError> {
        let url = format!(
            "{}/history-deals/time/{}/{}",
            self.base_url,
            start_time.to_rfc3339(),
            end_time.to_rfc3339()
        );
        let response = self
            .http
            .get(url)
            .query(&[("limit", limit)])
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(self.account_id.clone()));
        }
        let records = expect_ok(response).await?.json().await?;
        Ok(records)
    }
}
