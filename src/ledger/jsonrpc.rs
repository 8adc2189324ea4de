//! Blocking JSON-RPC client for the external ledger.
//!
//! Speaks the ledger's generic `/jsonrpc` endpoint: `execute_kw` on the
//! "object" service carries every model call, "common"/"authenticate"
//! establishes the session uid.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use super::client::{ExecuteOutcome, LedgerClient, LedgerError, PageOptions};

/// Connection settings for [`JsonRpcLedger`].
#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    /// Base URL, e.g. "https://erp.example.com".
    pub url: String,
    /// Database name.
    pub database: String,
    /// Login (usually an email address).
    pub login: String,
    /// API key or password.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl JsonRpcConfig {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        login: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            login: login.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// A connected ledger session.
pub struct JsonRpcLedger {
    http: reqwest::blocking::Client,
    config: JsonRpcConfig,
    uid: i64,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    /// Authenticate and return a ready-to-use session.
    pub fn connect(config: JsonRpcConfig) -> Result<Self, LedgerError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let mut session = Self {
            http,
            config,
            uid: 0,
            next_id: AtomicU64::new(1),
        };

        let result = session.call(
            "common",
            "authenticate",
            json!([
                session.config.database,
                session.config.login,
                session.config.api_key,
                {}
            ]),
        )?;
        session.uid = result.as_i64().ok_or_else(|| {
            LedgerError::Auth(format!(
                "authenticate returned {result} for {}",
                session.config.login
            ))
        })?;
        tracing::info!(uid = session.uid, db = %session.config.database, "ledger session established");
        Ok(session)
    }

    /// Session uid assigned by the ledger.
    pub fn uid(&self) -> i64 {
        self.uid
    }

    /// One raw JSON-RPC call. Returns the `result` member; a missing or
    /// null result comes back as `Value::Null`, which is *not* an error.
    fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": id,
        });

        let response = self
            .http
            .post(format!("{}/jsonrpc", self.config.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(LedgerError::Api(rpc_error_message(error)));
        }
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("HTTP {status}")));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> Result<Value, LedgerError> {
        self.call(
            "object",
            "execute_kw",
            json!([
                self.config.database,
                self.uid,
                self.config.api_key,
                model,
                method,
                args,
                kwargs
            ]),
        )
    }
}

/// Pull the most specific message out of a JSON-RPC error object.
fn rpc_error_message(error: &Value) -> String {
    error
        .get("data")
        .and_then(|d| d.get("message"))
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

impl LedgerClient for JsonRpcLedger {
    fn search_read(
        &self,
        model: &str,
        domain: &Value,
        fields: &[&str],
        page: &PageOptions,
    ) -> Result<Vec<Value>, LedgerError> {
        let mut kwargs = json!({ "fields": fields, "offset": page.offset });
        if let Some(limit) = page.limit {
            kwargs["limit"] = json!(limit);
        }
        if let Some(order) = &page.order {
            kwargs["order"] = json!(order);
        }
        let result = self.execute_kw(model, "search_read", json!([domain]), kwargs)?;
        match result {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            other => Err(LedgerError::Decode(format!(
                "search_read returned non-list: {other}"
            ))),
        }
    }

    fn write(&self, model: &str, ids: &[i64], values: &Value) -> Result<(), LedgerError> {
        // write returns true on success; anything else is suspect.
        let result = self.execute_kw(model, "write", json!([ids, values]), json!({}))?;
        match result {
            Value::Bool(true) | Value::Null => Ok(()),
            other => Err(LedgerError::Api(format!("write returned {other}"))),
        }
    }

    fn execute(
        &self,
        model: &str,
        method: &str,
        ids: &[i64],
    ) -> Result<ExecuteOutcome, LedgerError> {
        let result = self.execute_kw(model, method, json!([ids]), json!({}))?;
        match result {
            Value::Null => Ok(ExecuteOutcome::Empty),
            payload => Ok(ExecuteOutcome::Payload(payload)),
        }
    }
}
