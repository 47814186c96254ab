//! HTTP wire adapter.
//!
//! Exposes the driver-facing login endpoint and a minimal query endpoint.
//! A login issues an opaque token mapped to an engine session; later query
//! requests carry the token and execute on that session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use sm_engine::{Connection, Instance, InstanceOptions};

/// Shared server state: the engine instance plus the token → session map.
pub struct ServerState {
    instance: Mutex<Instance>,
    sessions: Mutex<HashMap<String, Connection>>,
}

impl ServerState {
    pub fn new(options: InstanceOptions) -> Result<Self, sm_engine::EngineError> {
        Ok(ServerState {
            instance: Mutex::new(Instance::new(options)?),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Create a session and register it under a fresh token.
    pub fn login(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
    ) -> Result<String, sm_engine::EngineError> {
        let conn = self.instance.lock().unwrap().connect(database, schema)?;
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.lock().unwrap().insert(token.clone(), conn);
        Ok(token)
    }

    fn session(&self, token: &str) -> Option<Connection> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(token).cloned()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "databaseName")]
    pub database_name: Option<String>,
    #[serde(rename = "schemaName")]
    pub schema_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "sqlText")]
    pub sql_text: String,
    /// Token in the body, for clients that do not send the header
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WireResponse {
    pub data: JsonValue,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /session/v1/login-request`
pub async fn login_request(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<LoginParams>,
) -> Json<WireResponse> {
    match state.login(params.database_name.as_deref(), params.schema_name.as_deref()) {
        Ok(token) => Json(WireResponse {
            data: json!({ "token": token }),
            success: true,
            message: None,
        }),
        Err(e) => Json(error_response(&e)),
    }
}

/// `POST /queries/v1/query-request`
pub async fn query_request(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Json<WireResponse> {
    let token = header_token(&headers).or(request.token.clone());
    let Some(conn) = token.as_deref().and_then(|t| state.session(t)) else {
        return Json(WireResponse {
            data: json!({}),
            success: false,
            message: Some("unknown or missing session token".to_string()),
        });
    };

    let mut cursor = conn.cursor();
    if let Err(e) = cursor.execute(&request.sql_text) {
        return Json(error_response(&e));
    }

    let rowtype = match cursor.description() {
        Ok(rowtype) => rowtype,
        Err(e) => return Json(error_response(&e)),
    };
    let rows = match cursor.fetchall() {
        Ok(rows) => rows,
        Err(e) => return Json(error_response(&e)),
    };

    let rowset: Vec<Vec<JsonValue>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    sm_engine::Value::Null => JsonValue::Null,
                    other => JsonValue::String(other.to_string()),
                })
                .collect()
        })
        .collect();

    let rowtype_json: Vec<JsonValue> = rowtype
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "type": c.sf_type,
                "precision": c.precision,
                "scale": c.scale,
                "length": c.internal_size,
                "nullable": c.is_nullable,
            })
        })
        .collect();

    Json(WireResponse {
        data: json!({
            "rowtype": rowtype_json,
            "rowset": rowset,
            "total": rows.len(),
            "queryId": cursor.sfqid(),
        }),
        success: true,
        message: None,
    })
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    // `Snowflake Token="<token>"`
    let start = value.find('"')? + 1;
    let end = value.rfind('"')?;
    (end > start).then(|| value[start..end].to_string())
}

fn error_response(e: &sm_engine::EngineError) -> WireResponse {
    WireResponse {
        data: json!({
            "errorCode": format!("{:06}", e.errno()),
            "sqlState": e.sqlstate(),
        }),
        success: false,
        message: Some(e.to_string()),
    }
}

/// Build the wire router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/session/v1/login-request", post(login_request))
        .route("/queries/v1/query-request", post(query_request))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr, options: InstanceOptions) -> std::io::Result<()> {
    let state = Arc::new(
        ServerState::new(options).map_err(|e| std::io::Error::other(e.to_string()))?,
    );
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("snowmock server listening on {addr}");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<ServerState> {
        Arc::new(ServerState::new(InstanceOptions::new()).unwrap())
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let state = state();
        let response = login_request(
            State(Arc::clone(&state)),
            Query(LoginParams {
                database_name: Some("db1".to_string()),
                schema_name: Some("schema1".to_string()),
            }),
        )
        .await;
        assert!(response.0.success);
        let token = response.0.data["token"].as_str().unwrap().to_string();
        assert!(!token.is_empty());
        assert!(state.session(&token).is_some());
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let state = state();
        let token = state.login(Some("db1"), Some("schema1")).unwrap();

        let response = query_request(
            State(Arc::clone(&state)),
            HeaderMap::new(),
            Json(QueryRequest {
                sql_text: "SELECT 1 AS N".to_string(),
                token: Some(token),
            }),
        )
        .await;
        assert!(response.0.success, "{:?}", response.0.message);
        assert_eq!(response.0.data["rowset"][0][0], "1");
        assert_eq!(response.0.data["rowtype"][0]["name"], "N");
        assert_eq!(response.0.data["rowtype"][0]["type"], "fixed");
    }

    #[tokio::test]
    async fn test_query_unknown_token() {
        let state = state();
        let response = query_request(
            State(state),
            HeaderMap::new(),
            Json(QueryRequest {
                sql_text: "SELECT 1".to_string(),
                token: Some("nope".to_string()),
            }),
        )
        .await;
        assert!(!response.0.success);
    }

    #[test]
    fn test_header_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            "Snowflake Token=\"abc123\"".parse().unwrap(),
        );
        assert_eq!(header_token(&headers), Some("abc123".to_string()));
    }
}
