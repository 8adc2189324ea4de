//! Derive and verify the reporting tags that accompany a tax code.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::{TaxCode, TaxLine};

use super::registry::Registry;

/// A line's tags do not agree with its applied code's configuration.
///
/// A code configured with zero tags is itself a data error — statutory
/// returns are generated from these tags, so "no tags found" is never
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagMismatch {
    #[error("tax code {code_id} has no configured reporting tags")]
    Unconfigured { code_id: i64 },

    #[error("tax code {code_id} is not in the registry")]
    UnknownCode { code_id: i64 },

    #[error("line {line_id} tags {found:?} do not match code {code_id} tags {expected:?}")]
    Mismatch {
        line_id: i64,
        code_id: i64,
        expected: BTreeSet<i64>,
        found: BTreeSet<i64>,
    },
}

/// The tags a posted line must carry for `code`.
pub fn derive_tags(code: &TaxCode) -> &BTreeSet<i64> {
    &code.report_tags
}

/// Check a line's tags against its applied code's configured tags.
pub fn verify(line: &TaxLine, registry: &Registry) -> Result<(), TagMismatch> {
    let code = registry
        .by_id(line.applied_code)
        .ok_or(TagMismatch::UnknownCode {
            code_id: line.applied_code,
        })?;
    verify_against(line, code)
}

/// Check a line's tags against a specific code.
pub fn verify_against(line: &TaxLine, code: &TaxCode) -> Result<(), TagMismatch> {
    if code.report_tags.is_empty() {
        return Err(TagMismatch::Unconfigured { code_id: code.id });
    }
    if line.tags != code.report_tags {
        return Err(TagMismatch::Mismatch {
            line_id: line.id,
            code_id: code.id,
            expected: code.report_tags.clone(),
            found: line.tags.clone(),
        });
    }
    Ok(())
}
