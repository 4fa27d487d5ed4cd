use std::env;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::error::{IntakeError, Result};

pub(crate) const NO_TIMEOUT_MS: u64 = u64::MAX;

pub(crate) fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Server-assigned ledger timestamp: UTC, second precision, ISO-8601.
pub(crate) fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// No explicit deadlines anywhere in the pipeline; outbound calls block
/// until the transport gives up on its own.
pub(crate) fn no_deadline_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_millis(NO_TIMEOUT_MS))
        .timeout_read(Duration::from_millis(NO_TIMEOUT_MS))
        .timeout_write(Duration::from_millis(NO_TIMEOUT_MS))
        .build()
}

/// Decode a JSON response body, mapping transport and HTTP-status failures
/// to `RemoteService` with the caller's context string.
pub(crate) fn response_json(
    resp: std::result::Result<ureq::Response, ureq::Error>,
    context: &str,
) -> Result<serde_json::Value> {
    match resp {
        Ok(resp) => resp
            .into_json::<serde_json::Value>()
            .map_err(|e| IntakeError::RemoteService {
                reason: format!("{context}: {e}"),
            }),
        Err(ureq::Error::Status(code, resp)) => {
            let text = resp.into_string().unwrap_or_default();
            Err(IntakeError::RemoteService {
                reason: format!("{context} error {code}: {text}"),
            })
        }
        Err(err) => Err(IntakeError::RemoteService {
            reason: format!("{context} failed: {err}"),
        }),
    }
}
