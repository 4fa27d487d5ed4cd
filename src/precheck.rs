use crate::model::{RawIntake, STREAM_SENTINEL};

/// Advisory readiness report used to drive form affordances before the
/// record model runs. Never sufficient for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Readiness {
    pub(crate) ready: bool,
    pub(crate) missing: Vec<&'static str>,
}

/// Cheap, partial validation of the raw field values. Missing fields are
/// reported by their human names in fixed priority order.
pub(crate) fn readiness(raw: &RawIntake) -> Readiness {
    let mut missing = Vec::new();

    if raw.date.is_none() {
        missing.push("Date");
    }
    if raw.stream.trim().is_empty() || raw.stream == STREAM_SENTINEL {
        missing.push("Stream");
    }
    if raw.founder_name.trim().is_empty() {
        missing.push("Founder name");
    }
    if raw.venture_name.trim().is_empty() {
        missing.push("Venture name");
    }
    if raw.venture_manager_name.trim().is_empty() {
        missing.push("Venture manager name");
    }
    if raw.password.trim().is_empty() {
        missing.push("Password");
    }
    if !looks_like_url(&raw.link) {
        missing.push("Link (must be a valid URL)");
    }

    Readiness {
        ready: missing.is_empty(),
        missing,
    }
}

/// Scheme-prefix check only; the record model does the real URL parse.
pub(crate) fn looks_like_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://")
}
