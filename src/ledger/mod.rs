//! Abstract ledger RPC surface and transports.
//!
//! [`LedgerClient`] is the seam the corrector and scanner work
//! against; [`JsonRpcLedger`] (feature `ledger`) is the production
//! transport. Tests substitute in-memory clients.

mod client;
#[cfg(feature = "ledger")]
mod jsonrpc;
mod retry;

pub use client::{ExecuteOutcome, LedgerClient, LedgerError, PageOptions};
#[cfg(feature = "ledger")]
pub use jsonrpc::{JsonRpcConfig, JsonRpcLedger};
pub use retry::{RetryPolicy, retry_read};
