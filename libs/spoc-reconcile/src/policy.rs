//! Caller-supplied handling of per-match failures

use errors::{SpocError, SpocErrorTrait, SpocResult};
use serde::{Deserialize, Serialize};
use tracing::{error, warn, Level};

use crate::param_match::{MatchGroup, ParamKey};

/// What a run does with a match-scoped failure
///
/// Schema and consistency errors are never subject to the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the run
    #[default]
    Raise,
    /// Log with context, skip the match and continue
    LogAndSkip,
}

/// Where a failure originated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext<'a> {
    pub key: &'a ParamKey,
    pub group: MatchGroup,
    pub table: &'a str,
    pub column: &'a str,
    pub value: &'a str,
}

/// A skipped match, as reported after the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFailure {
    pub key: ParamKey,
    pub group: MatchGroup,
    pub table: String,
    pub column: String,
    pub value: String,
    pub code: &'static str,
    pub message: String,
}

impl ErrorPolicy {
    /// Propagate `err`, or log it and describe the skipped match
    pub fn handle(self, err: SpocError, context: FailureContext<'_>) -> SpocResult<MatchFailure> {
        if self == ErrorPolicy::Raise || !err.is_match_scoped() {
            return Err(err);
        }

        if err.log_level() == Level::ERROR {
            error!(
                "[{}] {} {}@{} '{}': {}",
                err.error_code(),
                context.key,
                context.table,
                context.column,
                context.value,
                err
            );
        } else {
            warn!(
                "[{}] {} {}@{} '{}': {}",
                err.error_code(),
                context.key,
                context.table,
                context.column,
                context.value,
                err
            );
        }

        Ok(MatchFailure {
            key: context.key.clone(),
            group: context.group,
            table: context.table.to_string(),
            column: context.column.to_string(),
            value: context.value.to_string(),
            code: err.error_code(),
            message: err.to_string(),
        })
    }
}
