// NEAR JSON-RPC client for the game contract.
//
// Reads go through `query` / `call_function` view calls: arguments travel as
// base64-encoded JSON and the contract's return value comes back as a byte
// array holding JSON. Team commands are contract change calls that need a
// signed transaction; they are handed to a signing relayer when one is
// configured.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use rinkcast_core::config::Config;
use rinkcast_core::event::{decode_log_bytes, LogRecord};

use crate::backend::{parse_available_games, BackendError, GameBackend, GameSession, TeamCommand};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const RPC_REQUEST_ID: &str = "rinkcast";

// ---------------------------------------------------------------------------
// NearRpcBackend
// ---------------------------------------------------------------------------

struct Relayer {
    url: String,
    token: Option<String>,
}

/// Game backend talking to a NEAR RPC node.
pub struct NearRpcBackend {
    http: reqwest::Client,
    rpc_url: String,
    contract_id: String,
    games_method: String,
    events_method: String,
    games_page_limit: u32,
    relayer: Option<Relayer>,
}

impl NearRpcBackend {
    /// Build a backend from the application config.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.backend.request_timeout_ms))
            .build()
            .map_err(|e| {
                BackendError::RemoteUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        let relayer = config.backend.relayer_url.as_ref().map(|url| Relayer {
            url: url.trim_end_matches('/').to_string(),
            token: config.credentials.relayer_token.clone(),
        });

        Ok(NearRpcBackend {
            http,
            rpc_url: config.backend.rpc_url.clone(),
            contract_id: config.backend.contract_id.clone(),
            games_method: config.backend.games_method.clone(),
            events_method: config.backend.events_method.clone(),
            games_page_limit: config.backend.games_page_limit,
            relayer,
        })
    }

    /// Call a view method on the game contract and return its raw result.
    pub async fn view_call(&self, method: &str, args: &Value) -> Result<Vec<u8>, BackendError> {
        let body = view_request_body(&self.contract_id, method, args);
        debug!(method, "view call");

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::RemoteUnavailable(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::RemoteUnavailable(format!(
                "RPC returned status {status}"
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            BackendError::RemoteUnavailable(format!("invalid RPC response body: {e}"))
        })?;

        parse_view_result(&payload)
    }
}

#[async_trait]
impl GameBackend for NearRpcBackend {
    async fn available_games(&self) -> Result<Vec<GameSession>, BackendError> {
        let args = json!({ "from_index": 0, "limit": self.games_page_limit });
        let bytes = self.view_call(&self.games_method, &args).await?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            BackendError::RemoteUnavailable(format!("game listing is not JSON: {e}"))
        })?;
        parse_available_games(&value)
    }

    async fn fetch_events(&self, game_id: u64) -> Result<Vec<LogRecord>, BackendError> {
        let args = json!({ "game_id": game_id });
        let bytes = self.view_call(&self.events_method, &args).await?;
        decode_log_bytes(&bytes)
            .map_err(|e| BackendError::RemoteUnavailable(format!("malformed event log: {e}")))
    }

    async fn submit_command(
        &self,
        game_id: u64,
        command: TeamCommand,
    ) -> Result<(), BackendError> {
        let Some(relayer) = &self.relayer else {
            return Err(BackendError::Unsupported(
                "team commands need a signing relayer (backend.relayer_url)".to_string(),
            ));
        };

        let body = relayer_request_body(&self.contract_id, game_id, command);
        let mut request = self.http.post(format!("{}/call", relayer.url)).json(&body);
        if let Some(token) = &relayer.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::RemoteUnavailable(format!("relayer unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(method = command.method_name(), %status, "relayer rejected command");
            return Err(BackendError::RemoteUnavailable(format!(
                "relayer returned status {status}"
            )));
        }

        info!("Submitted {} for game {}", command.method_name(), game_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request/response helpers
// ---------------------------------------------------------------------------

/// JSON-RPC body for a `call_function` view query.
pub(crate) fn view_request_body(contract_id: &str, method: &str, args: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": RPC_REQUEST_ID,
        "method": "query",
        "params": {
            "request_type": "call_function",
            "finality": "final",
            "account_id": contract_id,
            "method_name": method,
            "args_base64": STANDARD.encode(args.to_string()),
        }
    })
}

/// Body posted to the relayer's `/call` endpoint.
pub(crate) fn relayer_request_body(contract_id: &str, game_id: u64, command: TeamCommand) -> Value {
    json!({
        "contract_id": contract_id,
        "method_name": command.method_name(),
        "args": { "game_id": game_id },
    })
}

/// Extract the view result bytes from a JSON-RPC response.
///
/// Expected shape: `{ "result": { "result": [u8, ...], "logs": [...] } }`
pub(crate) fn parse_view_result(payload: &Value) -> Result<Vec<u8>, BackendError> {
    if let Some(err) = payload.get("error") {
        return Err(BackendError::RemoteUnavailable(format!(
            "RPC error: {}",
            describe_rpc_error(err)
        )));
    }

    let result = payload
        .get("result")
        .ok_or_else(|| BackendError::RemoteUnavailable("RPC response has no result".to_string()))?;

    // Contract panics come back inside a successful envelope.
    if let Some(err) = result.get("error").and_then(Value::as_str) {
        return Err(BackendError::RemoteUnavailable(format!("contract error: {err}")));
    }

    let bytes = result
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::RemoteUnavailable("view result missing".to_string()))?;

    bytes
        .iter()
        .map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| BackendError::RemoteUnavailable("view result is not a byte array".into()))
}

fn describe_rpc_error(err: &Value) -> String {
    err.get("cause")
        .and_then(|c| c.get("name"))
        .or_else(|| err.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
