use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use mt5_core::model::HistoryQuery;
use mt5_core::{Error, ErrorKind};
use serde::Deserialize;
use serde_json::{json, Value};

type ApiResponse = (StatusCode, Json<Value>);

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

/// Error envelope: the message comes from the classified error, which never
/// carries credentials.
fn failure(err: &Error) -> ApiResponse {
    (
        status_for(err.kind()),
        Json(json!({"success": false, "message": err.to_string()})),
    )
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ConnectionTimeout | ErrorKind::RemoteService | ErrorKind::Unexpected => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn parse_iso(label: &str, value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::Validation(format!("{} is not a valid ISO-8601 timestamp", label)))
}

pub async fn health(State(state): State<AppState>) -> ApiResponse {
    let reachable = state.service.remote_reachable().await;
    ok(json!({
        "status": "OK",
        "remoteService": if reachable { "connected" } else { "unreachable" },
    }))
}

#[derive(Deserialize)]
pub struct ConnectRequest {
    server: Option<String>,
    login: Option<String>,
    password: Option<String>,
}

pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> ApiResponse {
    let (server, login, password) = match (request.server, request.login, request.password) {
        (Some(s), Some(l), Some(p)) => (s, l, p),
        _ => {
            return failure(&Error::Validation(
                "server, login and password are required".to_string(),
            ))
        }
    };

    match state.service.connect(&server, &login, &password).await {
        Ok(outcome) => {
            let s = &outcome.snapshot;
            ok(json!({
                "success": true,
                "accountId": outcome.account_id,
                "balance": s.balance,
                "equity": s.equity,
                "currency": s.currency,
                "leverage": s.leverage,
                "margin": s.margin,
                "freeMargin": s.free_margin,
                "marginLevel": s.margin_level,
                "message": format!("Connected to {} on {}", login, server),
            }))
        }
        Err(e) => failure(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdQuery {
    account_id: Option<String>,
}

pub async fn account_info(
    State(state): State<AppState>,
    Query(query): Query<AccountIdQuery>,
) -> ApiResponse {
    let account_id = match query.account_id {
        Some(id) if !id.is_empty() => id,
        _ => return failure(&Error::Validation("accountId is required".to_string())),
    };

    match state.service.account_info(&account_id).await {
        Ok(s) => ok(json!({
            "success": true,
            "balance": s.balance,
            "equity": s.equity,
            "currency": s.currency,
            "leverage": s.leverage,
            "margin": s.margin,
            "freeMargin": s.free_margin,
            "marginLevel": s.margin_level,
            "message": "Account information retrieved",
        })),
        Err(e) => failure(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    account_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResponse {
    let account_id = match params.account_id {
        Some(id) if !id.is_empty() => id,
        _ => return failure(&Error::Validation("accountId is required".to_string())),
    };

    let mut query = HistoryQuery::default();
    if let Some(value) = params.start_date.as_deref() {
        match parse_iso("startDate", value) {
            Ok(dt) => query.start_time = Some(dt),
            Err(e) => return failure(&e),
        }
    }
    if let Some(value) = params.end_date.as_deref() {
        match parse_iso("endDate", value) {
            Ok(dt) => query.end_time = Some(dt),
            Err(e) => return failure(&e),
        }
    }

    match state.service.history(&account_id, &query).await {
        Ok(records) => {
            let count = records.len();
            ok(json!({
                "success": true,
                "history": records,
                "message": format!("Retrieved {} history records", count),
            }))
        }
        Err(e) => failure(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    account_id: Option<String>,
}

pub async fn disconnect(
    State(state): State<AppState>,
    Json(request): Json<DisconnectRequest>,
) -> ApiResponse {
    let account_id = match request.account_id {
        Some(id) if !id.is_empty() => id,
        _ => return failure(&Error::Validation("accountId is required".to_string())),
    };

    match state.service.disconnect(&account_id).await {
        Ok(()) => ok(json!({
            "success": true,
            "message": format!("Account {} disconnected", account_id),
        })),
        Err(e) => failure(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt5_core::remote::mock::MockRemoteService;
    use mt5_core::BridgeService;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_state(remote: &MockRemoteService) -> AppState {
        AppState {
            service: Arc::new(BridgeService::with_poll_interval(
                Arc::new(remote.clone()),
                Duration::from_millis(5),
            )),
        }
    }

    #[test]
    fn error_kinds_map_to_the_documented_status_codes() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::ConnectionTimeout),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ErrorKind::RemoteService),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ErrorKind::Unexpected),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn iso_timestamps_parse_and_reject() {
        assert!(parse_iso("startDate", "2024-06-01T00:00:00Z").is_ok());
        assert!(parse_iso("startDate", "2024-06-01T00:00:00+02:00").is_ok());
        let err = parse_iso("endDate", "last tuesday").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("endDate"));
    }

    #[tokio::test]
    async fn connect_rejects_missing_fields_with_400() {
        let remote = MockRemoteService::new();
        let (status, Json(body)) = connect(
            State(test_state(&remote)),
            Json(ConnectRequest {
                server: Some("Acme-Live".to_string()),
                login: None,
                password: Some("p".to_string()),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert_eq!(remote.create_calls(), 0);
    }

    #[tokio::test]
    async fn connect_returns_account_id_and_snapshot() {
        let remote = MockRemoteService::new();
        let (status, Json(body)) = connect(
            State(test_state(&remote)),
            Json(ConnectRequest {
                server: Some("Acme-Live".to_string()),
                login: Some("1001".to_string()),
                password: Some("p".to_string()),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert!(body["accountId"].is_string());
        assert_eq!(body["currency"], json!("USD"));
        // The password must never appear in a response.
        assert!(!body.to_string().contains("\"p\""));
    }

    #[tokio::test]
    async fn account_info_for_unknown_id_is_404() {
        let remote = MockRemoteService::new();
        let (status, Json(body)) = account_info(
            State(test_state(&remote)),
            Query(AccountIdQuery {
                account_id: Some("acct-unknown".to_string()),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn history_rejects_malformed_dates() {
        let remote = MockRemoteService::new();
        let id = remote.add_connected_account("Acme-Live", "1001");
        let (status, Json(body)) = history(
            State(test_state(&remote)),
            Query(HistoryParams {
                account_id: Some(id),
                start_date: Some("not-a-date".to_string()),
                end_date: None,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn disconnect_requires_account_id() {
        let remote = MockRemoteService::new();
        let (status, _) = disconnect(
            State(test_state(&remote)),
            Json(DisconnectRequest { account_id: None }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(remote.undeploy_calls(), 0);
    }
}
