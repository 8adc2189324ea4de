use serde_json::Value;
use thiserror::Error;

/// Paging for `search_read` calls.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub offset: u32,
    /// `None` fetches everything the ledger will return.
    pub limit: Option<u32>,
    /// Ledger-side ordering clause (e.g. "id asc").
    pub order: Option<String>,
}

impl PageOptions {
    /// No offset, no limit, ledger default order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: Some(limit),
            order: Some("id asc".into()),
        }
    }
}

/// Outcome of an `execute` call.
///
/// The ledger's workflow methods legitimately return no payload. An
/// empty response is success that happened to carry nothing — it must
/// never be conflated with "the call did not happen", and success must
/// never be inferred from the text of an error message.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    /// The call returned a value.
    Payload(Value),
    /// The call succeeded with no payload.
    Empty,
}

/// RPC failure taxonomy. Only transport errors are safely retryable;
/// for anything else the caller must re-read state before retrying a
/// mutation, because the call's effect may already have landed.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Network-level failure — connection refused, timeout, TLS.
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger processed the call and returned an error.
    #[error("ledger rejected call: {0}")]
    Api(String),

    /// The response could not be decoded.
    #[error("malformed ledger response: {0}")]
    Decode(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl LedgerError {
    /// Whether a blind retry of the same call is safe.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Abstract RPC surface of the external ledger.
///
/// These three primitives are enough to express everything the engine
/// does: fetch candidates, rewrite lines, and drive the unpost/repost
/// workflow. Implementations must be safe to share across the scanner's
/// worker threads.
pub trait LedgerClient: Send + Sync {
    /// Search records matching `domain` and read `fields` from them.
    fn search_read(
        &self,
        model: &str,
        domain: &Value,
        fields: &[&str],
        page: &PageOptions,
    ) -> Result<Vec<Value>, LedgerError>;

    /// Write `values` onto the given records.
    fn write(&self, model: &str, ids: &[i64], values: &Value) -> Result<(), LedgerError>;

    /// Invoke a named method on the given records (unpost, repost, …).
    fn execute(&self, model: &str, method: &str, ids: &[i64])
    -> Result<ExecuteOutcome, LedgerError>;
}
