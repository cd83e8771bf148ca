use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of records returned for a history query that does not set a limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Width of the trailing window used when a history query sets no time bounds.
pub const DEFAULT_HISTORY_WINDOW_DAYS: i64 = 30;

/// Whether the remote service has allocated live infrastructure for an account.
///
/// Only the deployment controller mutates this; transitions are monotonic per
/// call (Undeployed -> Deploying -> Deployed on deploy, Deployed -> Undeployed
/// on undeploy) but an account can always be observed as already Deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Undeployed,
    Deploying,
    Deployed,
}

/// Whether the account's live connection can serve information queries.
///
/// Owned by the remote service; this crate only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A provisioned trading account as reported by the remote service.
///
/// Invariant: at most one account exists per (server case-insensitive,
/// login exact) pair; the registry never creates a duplicate for an
/// equivalent pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingAccount {
    /// Opaque identity assigned by the remote service.
    pub id: String,
    /// Display name derived from server and login at creation time.
    pub name: String,
    /// Broker server name. Matched case-insensitively.
    pub server: String,
    /// Broker login. Matched exactly.
    pub login: String,
    pub deployment_state: DeploymentState,
    pub connection_state: ConnectionState,
}

impl TradingAccount {
    /// The normalized key identifying this account across concurrent flows.
    pub fn key(&self) -> String {
        account_key(&self.server, &self.login)
    }
}

/// Normalized (server, login) key: server lowercased, login kept exact.
pub fn account_key(server: &str, login: &str) -> String {
    format!("{}:{}", server.to_ascii_lowercase(), login)
}

/// Point-in-time read of an account's financial state.
///
/// Fetched fresh on every request; never cached by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub currency: String,
    pub leverage: u32,
    pub margin: f64,
    pub free_margin: f64,
    pub margin_level: f64,
}

/// An opaque trade-history record, passed through from the remote service
/// without interpretation.
pub type HistoryRecord = serde_json::Value;

/// A trade-history request with optional bounds.
///
/// Missing bounds are defaulted by [`HistoryQuery::resolve`]; an inverted
/// range is deliberately NOT rejected here, it is passed through to the
/// remote service and its (possibly empty) response returned as-is.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// A history query with all defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHistoryQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub limit: usize,
}

impl HistoryQuery {
    /// Applies defaults: a trailing 30-day window ending now, limit 1000.
    pub fn resolve(&self) -> ResolvedHistoryQuery {
        self.resolve_at(Utc::now())
    }

    pub fn resolve_at(&self, now: DateTime<Utc>) -> ResolvedHistoryQuery {
        let end_time = self.end_time.unwrap_or(now);
        let start_time = self
            .start_time
            .unwrap_or(now - Duration::days(DEFAULT_HISTORY_WINDOW_DAYS));
        ResolvedHistoryQuery {
            start_time,
            end_time,
            limit: self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_query_resolves_to_trailing_month() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let resolved = HistoryQuery::default().resolve_at(now);

        assert_eq!(resolved.end_time, now);
        assert_eq!(resolved.start_time, now - Duration::days(30));
        assert_eq!(resolved.limit, 1000);
    }

    #[test]
    fn explicit_bounds_are_kept_even_when_inverted() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let query = HistoryQuery {
            start_time: Some(now),
            end_time: Some(now - Duration::days(5)),
            limit: Some(7),
        };
        let resolved = query.resolve_at(now);

        // Inverted on purpose: range validation is the remote's business.
        assert_eq!(resolved.start_time, now);
        assert_eq!(resolved.end_time, now - Duration::days(5));
        assert_eq!(resolved.limit, 7);
    }

    #[test]
    fn account_key_normalizes_server_case_only() {
        assert_eq!(account_key("Acme-Live", "1001"), "acme-live:1001");
        assert_eq!(account_key("ACME-LIVE", "1001"), "acme-live:1001");
        assert_ne!(account_key("acme-live", "1001"), account_key("acme-live", "1002"));
    }
}
