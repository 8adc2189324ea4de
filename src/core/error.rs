use thiserror::Error;

use crate::ledger::LedgerError;

/// Fatal startup errors. Per-document failures never use this type —
/// they are isolated and recorded as [`CorrectionResult`] values so a
/// batch can keep going.
///
/// [`CorrectionResult`]: crate::core::CorrectionResult
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The tax code registry could not be loaded or is unusable.
    #[error("registry load failed: {0}")]
    RegistryLoad(String),

    /// The ledger could not be reached or refused the connection.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
